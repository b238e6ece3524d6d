use std::path::PathBuf;

use kernel_forge::config::CompilerConfig;
use kernel_forge::dsl;
use kernel_forge::error::ErrorKind;

fn case_dir(case_name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
        .join(case_name)
}

fn list_json_cases(dir: &std::path::Path, update_goldens: bool) -> Vec<PathBuf> {
    let mut cases = Vec::new();
    let Ok(rd) = std::fs::read_dir(dir) else {
        return cases;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        // Only cases with a committed golden run unless goldens are being rewritten.
        if is_json && (update_goldens || path.with_extension("hlsl").is_file()) {
            cases.push(path);
        }
    }
    cases.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    cases
}

fn case_stem(path: &std::path::Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("case")
        .to_string()
}

#[test]
fn kernel_json_compiles_to_golden_hlsl() {
    let dir = case_dir("hlsl_generation");
    let update_goldens = std::env::var("UPDATE_GOLDENS").is_ok_and(|v| v != "0");

    let json_cases = list_json_cases(&dir, update_goldens);
    assert!(
        !json_cases.is_empty(),
        "expected at least one *.json case in {}",
        dir.display()
    );

    for input_path in json_cases {
        let case_name = case_stem(&input_path);
        let kernel = dsl::load_kernel_from_path(&input_path)
            .unwrap_or_else(|e| panic!("case {case_name}: load kernel json failed: {e:#}"));
        let built = dsl::build_kernel_unit(&kernel)
            .unwrap_or_else(|e| panic!("case {case_name}: build kernel unit failed: {e:#}"));
        let source = built
            .unit
            .compile(&built.types, &CompilerConfig::default())
            .unwrap_or_else(|e| panic!("case {case_name}: compile failed: {e}"));

        assert!(
            source.text.ends_with('\n'),
            "case {case_name}: unit should end with a newline"
        );

        let expected_path = input_path.with_extension("hlsl");
        if update_goldens {
            std::fs::write(&expected_path, &source.text)
                .unwrap_or_else(|e| panic!("write {:?}: {e}", expected_path));
        } else {
            let expected = std::fs::read_to_string(&expected_path)
                .unwrap_or_else(|e| panic!("read {:?}: {e}", expected_path));
            assert_eq!(
                source.text, expected,
                "case {case_name}: HLSL differs from golden"
            );
        }
    }
}

#[test]
fn unit_compilation_is_deterministic() {
    let path = case_dir("hlsl_generation").join("tone_map.json");
    let kernel = dsl::load_kernel_from_path(&path).unwrap();
    let first = dsl::build_kernel_unit(&kernel).unwrap();
    let second = dsl::build_kernel_unit(&kernel).unwrap();
    let config = CompilerConfig::default();
    assert_eq!(
        first.unit.compile(&first.types, &config).unwrap(),
        second.unit.compile(&second.types, &config).unwrap()
    );
}

#[test]
fn unsupported_nodes_abort_the_unit() {
    let json = r#"{
        "version": "1",
        "name": "bad",
        "functions": [{
            "name": "main",
            "returns": "float",
            "body": {"kind": "tree", "expr": {"kind": "opaque", "node": "conditional"}}
        }]
    }"#;
    let kernel: dsl::KernelDSL = serde_json::from_str(json).unwrap();
    let built = dsl::build_kernel_unit(&kernel).unwrap();
    let err = built
        .unit
        .compile(&built.types, &CompilerConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedNode);
    assert!(err.to_string().contains("conditional"));
}

#[test]
fn instance_calls_surface_as_unsupported() {
    let json = r#"{
        "version": "1",
        "name": "bad",
        "functions": [{
            "name": "main",
            "params": [{"name": "a", "type": "float"}],
            "returns": "float",
            "body": {"kind": "tree", "expr": {
                "kind": "call",
                "target": {"form": "instance", "receiver": {"kind": "parameter", "name": "a", "type": "float"}, "method": "Sqrt"},
                "type": "float"
            }}
        }]
    }"#;
    let kernel: dsl::KernelDSL = serde_json::from_str(json).unwrap();
    let built = dsl::build_kernel_unit(&kernel).unwrap();
    let err = built
        .unit
        .compile(&built.types, &CompilerConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedNode);
}
