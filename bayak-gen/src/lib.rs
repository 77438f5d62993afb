//! Lowers a bayak AST into textual bytecode assembly (the format `bayak-asm`
//! assembles into a binary image).
mod codegen;
mod error;

pub use codegen::generate;
pub use error::GenError;

#[cfg(test)]
mod tests {
    use super::*;
    use bayak_lex::lex;
    use bayak_par::parse;

    fn gen_src(src: &str) -> String {
        let tokens = lex(src).expect("lex");
        let script = parse(tokens).expect("parse");
        generate(&script).expect("gen")
    }

    #[test]
    fn flat_plus_chain_is_left_associative() {
        let asm = gen_src("print(1 - 2 + 3)\n");
        // 1 - 2 + 3: push 3, 2, 1; SUB (1-2); ADD (result+3)
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LOAD_CONST 3",
                "LOAD_CONST 2",
                "LOAD_CONST 1",
                "SUB",
                "ADD",
                "CALL_BUILTIN 0",
            ]
        );
    }

    #[test]
    fn mult_nests_inside_plus_chain() {
        let asm = gen_src("x = 1 + 2 * 3\n");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LOAD_CONST 3",
                "LOAD_CONST 2",
                "MULT",
                "LOAD_CONST 1",
                "ADD",
                "STORE_GLOBAL 0",
            ]
        );
    }

    #[test]
    fn assignment_to_global_then_read_back() {
        let asm = gen_src("x = 5\nprint(x)\n");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec!["LOAD_CONST 5", "STORE_GLOBAL 0", "LOAD_GLOBAL 0", "CALL_BUILTIN 0"]
        );
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let tokens = lex("print(x)\n").unwrap();
        let script = parse(tokens).unwrap();
        let err = generate(&script).unwrap_err();
        assert_eq!(err, GenError::UnknownName("x".to_string()));
    }

    #[test]
    fn unknown_function_is_an_error() {
        let tokens = lex("foo()\n").unwrap();
        let script = parse(tokens).unwrap();
        let err = generate(&script).unwrap_err();
        assert_eq!(err, GenError::UnknownName("foo".to_string()));
    }

    #[test]
    fn function_params_map_to_ascending_local_slots() {
        let asm = gen_src("def f(a, b):\n    return a - b\nf(1, 2)\n");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "PROC",
                "STORE_VAR 1",
                "STORE_VAR 0",
                "LOAD_LOCAL 1",
                "LOAD_LOCAL 0",
                "SUB",
                "RETN",
                "MAKE_FUNCTION",
                "LOAD_CONST 1",
                "LOAD_CONST 2",
                "CALL 0",
            ]
        );
    }

    #[test]
    fn if_else_chain_produces_balanced_jumps() {
        let asm = gen_src("if 1 == 1:\n    pass\nelse:\n    pass\n");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LOAD_CONST 1",
                "LOAD_CONST 1",
                "CMP 0",
                "JZ _0_0_next0",
                "PASS",
                "JMP _0_0_out",
                "_0_0_next0: PASS",
                "_0_0_out: PASS",
            ]
        );
    }

    #[test]
    fn sibling_if_chains_in_the_same_scope_get_distinct_labels() {
        let asm = gen_src("if 1:\n    pass\nif 2:\n    pass\n");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LOAD_CONST 1",
                "JZ _0_0_out",
                "PASS",
                "_0_0_out: LOAD_CONST 2",
                "JZ _1_0_out",
                "PASS",
                "_1_0_out: PASS",
            ]
        );
    }

    #[test]
    fn string_literal_with_embedded_quote_is_escaped() {
        let asm = gen_src("print('it\\'s')\n");
        assert!(asm.lines().next().unwrap().starts_with("LOAD_CONST 'it\\'s'"));
    }
}
