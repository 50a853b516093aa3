#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use jazz::error::JazzError;
    use jazz::interpreter::Interpreter;

    /// Write sink that stays readable after being handed to the interpreter.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("output was not UTF-8")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_capture(source: &str) -> (String, Result<(), Vec<JazzError>>) {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::new().with_output(Box::new(buf.clone()));

        let result = jazz::run(&mut interpreter, source);

        (buf.contents(), result)
    }

    fn run_ok(source: &str) -> String {
        let (out, result) = run_capture(source);
        result.expect("chunk failed");
        out
    }

    fn first_error(source: &str) -> JazzError {
        let (_, result) = run_capture(source);
        result.expect_err("chunk unexpectedly succeeded").remove(0)
    }

    // ── End-to-end behavior ─────────────────────────────────────────────

    #[test]
    fn closures_capture_the_defining_scope() {
        let out = run_ok(
            "fn makeCounter() {\n\
             \x20 let i = 0;\n\
             \x20 fn count() { i = i + 1; print i; }\n\
             \x20 return count;\n\
             }\n\
             let c = makeCounter();\n\
             c(); c(); c();",
        );

        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn resolver_freezes_closure_bindings() {
        let out = run_ok(
            "let a = \"global\";\n\
             {\n\
             \x20 fn showA() { print a; }\n\
             \x20 showA();\n\
             \x20 let a = \"block\";\n\
             \x20 showA();\n\
             }",
        );

        assert_eq!(out, "global\nglobal\n");
    }

    #[test]
    fn short_circuit_returns_the_deciding_operand() {
        // Results are the deciding operands themselves, never coerced
        // booleans.  0 is truthy, so 'and' falls through to its right side.
        assert_eq!(run_ok("print nil or \"hello\";"), "hello\n");
        assert_eq!(run_ok("print 0 and \"second\";"), "second\n");
        assert_eq!(run_ok("print false and \"never\";"), "false\n");
        assert_eq!(run_ok("print \"first\" or \"never\";"), "first\n");
    }

    #[test]
    fn plus_concatenates_when_either_side_is_a_string() {
        assert_eq!(run_ok("print \"value=\" + 42;"), "value=42\n");
        assert_eq!(run_ok("print 42 + \"!\";"), "42!\n");
    }

    #[test]
    fn top_level_return_resolves_to_an_error_and_nothing_runs() {
        let (out, result) = run_capture("print \"before\";\nreturn 1;");

        let errors = result.expect_err("expected a resolver error");
        assert!(matches!(errors[0], JazzError::Resolve { .. }));
        assert!(errors[0]
            .to_string()
            .contains("cannot return from top-level code"));

        // The chunk aborts before evaluation, so even the valid print ran
        // nothing.
        assert_eq!(out, "");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = first_error("print 1/0;");

        assert!(matches!(err, JazzError::Runtime { .. }));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn arity_mismatch_names_both_counts() {
        let err = first_error("fn f(a){} f(1,2);");

        assert!(err.to_string().contains("expected 1, got 2"));
    }

    // ── Values and operators ────────────────────────────────────────────

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(run_ok("print 1 + 2 * 3 - 4 / 2;"), "5\n");
    }

    #[test]
    fn strings_coerce_to_numbers_in_arithmetic() {
        assert_eq!(run_ok("print \"3\" * \"2\";"), "6\n");
        assert_eq!(run_ok("print \"10\" - 1;"), "9\n");
    }

    #[test]
    fn non_numeric_string_fails_coercion() {
        let err = first_error("print \"x\" * 2;");

        assert!(err.to_string().contains("operand must be a number"));
    }

    #[test]
    fn unary_minus_and_bang() {
        assert_eq!(run_ok("print -3 + 5;"), "2\n");
        assert_eq!(run_ok("print !nil;"), "true\n");
        assert_eq!(run_ok("print !!\"\";"), "true\n");
    }

    #[test]
    fn equality_is_same_kind_only() {
        assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
        assert_eq!(run_ok("print nil == nil;"), "true\n");
        assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
        assert_eq!(run_ok("print 1 != 2;"), "true\n");
        assert_eq!(run_ok("print nil == false;"), "false\n");
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        // String coercion is the only road to NaN in the language.
        assert_eq!(run_ok("print (\"NaN\" * 1) == (\"NaN\" * 1);"), "false\n");
    }

    #[test]
    fn comparisons() {
        assert_eq!(run_ok("print 1 < 2;"), "true\n");
        assert_eq!(run_ok("print 2 <= 2;"), "true\n");
        assert_eq!(run_ok("print 3 > 4;"), "false\n");
        assert_eq!(run_ok("print \"10\" >= 9;"), "true\n");
    }

    #[test]
    fn stringification_of_values() {
        assert_eq!(run_ok("print nil;"), "nil\n");
        assert_eq!(run_ok("print true;"), "true\n");
        assert_eq!(run_ok("print 2.5;"), "2.5\n");
        assert_eq!(run_ok("print 4;"), "4\n");
        assert_eq!(run_ok("fn greet() {} print greet;"), "<fn greet>\n");
        assert_eq!(run_ok("print clock;"), "<native fn>\n");
    }

    // ── Variables, scoping, control flow ────────────────────────────────

    #[test]
    fn block_scoping_and_shadowing() {
        let out = run_ok(
            "let a = 1;\n\
             {\n\
             \x20 let a = 2;\n\
             \x20 print a;\n\
             }\n\
             print a;",
        );

        assert_eq!(out, "2\n1\n");
    }

    #[test]
    fn assignment_writes_through_to_the_defining_scope() {
        let out = run_ok(
            "let a = 1;\n\
             {\n\
             \x20 a = 2;\n\
             }\n\
             print a;",
        );

        assert_eq!(out, "2\n");
    }

    #[test]
    fn assignment_is_an_expression_yielding_the_value() {
        assert_eq!(run_ok("let a = 0; let b = 0; print a = b = 7;"), "7\n");
    }

    #[test]
    fn undefined_variable_read_is_a_runtime_error() {
        let err = first_error("print ghost;");

        assert!(err.to_string().contains("undefined variable 'ghost'"));
    }

    #[test]
    fn undefined_variable_assignment_is_a_runtime_error() {
        let err = first_error("ghost = 1;");

        assert!(err.to_string().contains("undefined variable 'ghost'"));
    }

    #[test]
    fn if_else_follows_truthiness() {
        assert_eq!(run_ok("if (0) print \"t\"; else print \"f\";"), "t\n");
        assert_eq!(run_ok("if (\"\") print \"t\"; else print \"f\";"), "t\n");
        assert_eq!(run_ok("if (nil) print \"t\"; else print \"f\";"), "f\n");
    }

    #[test]
    fn while_loop_runs_to_completion() {
        let out = run_ok(
            "let i = 0;\n\
             while (i < 3) {\n\
             \x20 print i;\n\
             \x20 i = i + 1;\n\
             }",
        );

        assert_eq!(out, "0\n1\n2\n");
    }

    #[test]
    fn for_loop_desugars_and_runs() {
        assert_eq!(
            run_ok("for (let i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn for_loop_variable_stays_local() {
        let err = first_error("for (let i = 0; i < 1; i = i + 1) {} print i;");

        assert!(err.to_string().contains("undefined variable 'i'"));
    }

    // ── Functions ───────────────────────────────────────────────────────

    #[test]
    fn recursion_works_through_the_declaring_scope() {
        let out = run_ok(
            "fn fib(n) {\n\
             \x20 if (n < 2) { return n; }\n\
             \x20 return fib(n - 1) + fib(n - 2);\n\
             }\n\
             print fib(10);",
        );

        assert_eq!(out, "55\n");
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(run_ok("fn noop() {} print noop();"), "nil\n");
    }

    #[test]
    fn bare_return_yields_nil() {
        assert_eq!(run_ok("fn f() { return; } print f();"), "nil\n");
    }

    #[test]
    fn return_unwinds_out_of_nested_blocks_and_loops() {
        let out = run_ok(
            "fn firstOver(limit) {\n\
             \x20 let i = 0;\n\
             \x20 while (true) {\n\
             \x20   if (i > limit) { return i; }\n\
             \x20   i = i + 1;\n\
             \x20 }\n\
             }\n\
             print firstOver(5);",
        );

        assert_eq!(out, "6\n");
    }

    #[test]
    fn arguments_evaluate_in_source_order() {
        let out = run_ok(
            "fn tag(x) { print x; return x; }\n\
             fn pair(a, b) {}\n\
             pair(tag(1), tag(2));",
        );

        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn calling_a_non_function_is_a_runtime_error() {
        let err = first_error("let x = 4; x();");

        assert!(err.to_string().contains("callee is not a function"));
    }

    #[test]
    fn functions_are_first_class_values() {
        let out = run_ok(
            "fn twice(f, x) { return f(f(x)); }\n\
             fn inc(n) { return n + 1; }\n\
             print twice(inc, 5);",
        );

        assert_eq!(out, "7\n");
    }

    #[test]
    fn two_closures_share_one_captured_scope() {
        let out = run_ok(
            "fn makePair() {\n\
             \x20 let n = 0;\n\
             \x20 fn set(v) { n = v; }\n\
             \x20 fn get() { return n; }\n\
             \x20 set(41);\n\
             \x20 print get();\n\
             }\n\
             makePair();",
        );

        assert_eq!(out, "41\n");
    }

    #[test]
    fn clock_returns_a_number_of_milliseconds() {
        // Anything since 2020 is comfortably past this bound.
        assert_eq!(run_ok("print clock() > 1577836800000;"), "true\n");
    }

    #[test]
    fn clock_arity_is_zero() {
        let err = first_error("clock(1);");

        assert!(err.to_string().contains("expected 0, got 1"));
    }

    // ── Driver behavior ─────────────────────────────────────────────────

    #[test]
    fn definitions_accumulate_across_chunks() {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::new().with_output(Box::new(buf.clone()));

        jazz::run(&mut interpreter, "fn double(n) { return n * 2; }").unwrap();
        jazz::run(&mut interpreter, "let x = double(21);").unwrap();
        jazz::run(&mut interpreter, "print x;").unwrap();

        assert_eq!(buf.contents(), "42\n");
    }

    #[test]
    fn node_ids_stay_unique_across_chunks() {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::new().with_output(Box::new(buf.clone()));

        // The local 'a' gets a resolved depth in the persistent side-table.
        jazz::run(&mut interpreter, "{ let a = 1; print a; }").unwrap();

        // A later chunk's first variable node must not alias that entry: this
        // read is a plain missing global, not a stale local at depth 0.
        let errors = jazz::run(&mut interpreter, "print ghost;").unwrap_err();

        assert!(errors[0].to_string().contains("undefined variable 'ghost'"));
        assert_eq!(buf.contents(), "1\n");
    }

    #[test]
    fn repl_mode_echoes_expression_statements() {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::new()
            .with_repl()
            .with_output(Box::new(buf.clone()));

        jazz::run(&mut interpreter, "1 + 2;").unwrap();

        assert_eq!(buf.contents(), "3\n");
    }

    #[test]
    fn file_mode_does_not_echo_expression_statements() {
        assert_eq!(run_ok("1 + 2;"), "");
    }

    #[test]
    fn runtime_error_aborts_the_rest_of_the_chunk() {
        let (out, result) = run_capture("print 1; print ghost; print 2;");

        assert!(result.is_err());
        assert_eq!(out, "1\n");
    }

    #[test]
    fn lexical_errors_abort_before_any_evaluation() {
        let (out, result) = run_capture("print 1; $");

        let errors = result.expect_err("expected lexical errors");
        assert!(matches!(errors[0], JazzError::Lex { .. }));
        assert_eq!(out, "");
    }

    #[test]
    fn syntax_errors_abort_before_any_evaluation() {
        let (out, result) = run_capture("print 1; print ;");

        let errors = result.expect_err("expected syntax errors");
        assert!(matches!(errors[0], JazzError::Parse { .. }));
        assert_eq!(out, "");
    }
}
