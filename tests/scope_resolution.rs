use kernel_forge::compiler::expr::{Constant, Literal};
use kernel_forge::compiler::scope::SymbolScope;
use kernel_forge::compiler::symbol::{Declaration, Symbol};
use kernel_forge::compiler::types::{HostType, TypeRegistry};
use kernel_forge::error::ErrorKind;
use proptest::prelude::*;

fn literal(v: i32) -> Literal {
    Literal::new(Constant::Int(v)).unwrap()
}

#[test]
fn grandchild_sees_root_until_shadowed() {
    let mut root = SymbolScope::root("kernel");
    let s = Symbol::new("s", HostType::INT).unwrap();
    root.declare(&s, literal(1)).unwrap();

    let mut function = root.child("function");
    let types = TypeRegistry::standard();
    let decl = Declaration::resolve("s", HostType::FLOAT, &types).unwrap();
    let symbol = decl.symbol().clone();
    function.declare(&symbol, decl).unwrap();

    let block = function.child("block");
    // Innermost binding wins, so asking for the outer kind fails.
    assert_eq!(
        block.resolve::<Literal>("s").unwrap_err().kind(),
        ErrorKind::UnresolvedSymbol
    );
    assert!(block.resolve::<Declaration>("s").is_ok());
    assert!(root.resolve::<Literal>("s").is_ok());
    assert_eq!(block.parent().map(|p| p.name()), Some("function"));
}

proptest! {
    #[test]
    fn valid_identifiers_are_accepted(name in "[A-Za-z_][A-Za-z0-9_]{0,16}") {
        prop_assert!(Symbol::new(name, HostType::FLOAT).is_ok());
    }

    #[test]
    fn identifiers_with_a_leading_digit_are_rejected(name in "[0-9][A-Za-z0-9_]{0,16}") {
        let err = Symbol::new(name, HostType::FLOAT).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn shadowing_never_leaks_outward(outer in any::<i32>(), inner in any::<i32>()) {
        let s = Symbol::new("s", HostType::INT).unwrap();
        let mut root = SymbolScope::root("outer");
        root.declare(&s, literal(outer)).unwrap();
        {
            let mut child = root.child("inner");
            prop_assert_eq!(child.resolve::<Literal>("s").unwrap().value(), &Constant::Int(outer));
            child.declare(&s, literal(inner)).unwrap();
            prop_assert_eq!(child.resolve::<Literal>("s").unwrap().value(), &Constant::Int(inner));
        }
        prop_assert_eq!(root.resolve::<Literal>("s").unwrap().value(), &Constant::Int(outer));
    }
}
