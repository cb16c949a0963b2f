use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::Arc;
use twig::prelude::*;

struct ErrorDrop;

static ERROR_DROP: Lazy<Arc<Descriptor<ErrorDrop>>> = Lazy::new(|| {
    Descriptor::new("ErrorDrop")
        .member("standard_error", |_, _| Err(Error::standard("standard error")))
        .member("argument_error", |_, _| Err(Error::argument("argument error")))
        .member("syntax_error", |_, _| Err(Error::syntax("syntax error")))
        .member("exception", |_, _| Err(Error::interrupt("exception")))
        .build()
});

impl Sandboxed for ErrorDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        ERROR_DROP.clone()
    }
}

fn assigns() -> Value {
    let mut map = twig::value::Object::new();
    map.insert("errors".to_string(), Value::host(ErrorDrop));
    Value::Object(map)
}

fn options(mode: ErrorMode) -> ParseOptions {
    ParseOptions::new().with_error_mode(mode)
}

#[test]
fn test_templates_parsed_with_line_numbers_renders_them_in_errors() {
    let source = "Hello,\n\
                  \n\
                  {{ errors.standard_error }} will raise a standard error.\n\
                  \n\
                  Bla bla test.\n\
                  \n\
                  {{ errors.syntax_error }} will raise a syntax error.\n\
                  \n\
                  This is an argument error: {{ errors.argument_error }}\n\
                  \n\
                  Bla.\n";

    let expected = "Hello,\n\
                    \n\
                    Twig error (line 3): standard error will raise a standard error.\n\
                    \n\
                    Bla bla test.\n\
                    \n\
                    Twig syntax error (line 7): syntax error will raise a syntax error.\n\
                    \n\
                    This is an argument error: Twig error (line 9): argument error\n\
                    \n\
                    Bla.\n";

    let template =
        Template::parse_with(source, &options(ErrorMode::Lax).with_line_numbers(true)).unwrap();
    assert_eq!(template.render(&assigns()).unwrap(), expected);
}

#[test]
fn test_standard_error() {
    let template = Template::parse_with(" {{ errors.standard_error }} ", &options(ErrorMode::Lax)).unwrap();
    assert_eq!(template.render(&assigns()).unwrap(), " Twig error: standard error ");

    let errors = template.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Standard(_)));
}

#[test]
fn test_syntax() {
    let template = Template::parse_with(" {{ errors.syntax_error }} ", &options(ErrorMode::Lax)).unwrap();
    assert_eq!(template.render(&assigns()).unwrap(), " Twig syntax error: syntax error ");

    let errors = template.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_syntax());
}

#[test]
fn test_argument() {
    let template = Template::parse_with(" {{ errors.argument_error }} ", &options(ErrorMode::Lax)).unwrap();
    assert_eq!(template.render(&assigns()).unwrap(), " Twig error: argument error ");

    let errors = template.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Argument(_)));
}

#[test]
fn test_missing_endtag_parse_time_error() {
    let err = Template::parse_with(" {% for a in b %} ... ", &options(ErrorMode::Lax)).unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.message(), "'for' tag was never closed");
}

#[test]
fn test_unrecognized_operator() {
    let err =
        Template::parse_with(" {% if 1 =! 2 %}ok{% endif %} ", &options(ErrorMode::Strict)).unwrap_err();
    assert!(err.is_syntax());
}

#[test]
fn test_lax_unrecognized_operator() {
    let template =
        Template::parse_with(" {% if 1 =! 2 %}ok{% endif %} ", &options(ErrorMode::Lax)).unwrap();
    assert_eq!(template.render(&Value::Nil).unwrap(), " Twig error: Unknown operator =! ");

    let errors = template.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::Argument(_)));
}

#[test]
fn test_with_line_numbers_adds_numbers_to_parser_errors() {
    let source = "\n    foobar\n\n    {% \"cat\" | foobar %}\n\n    bla\n";
    let err =
        Template::parse_with(source, &options(ErrorMode::Lax).with_line_numbers(true)).unwrap_err();
    assert!(err.to_string().starts_with("Twig syntax error (line 4)"));
}

#[test]
fn test_parsing_warn_with_line_numbers_adds_numbers_to_lexer_errors() {
    let source = "\n    foobar\n\n    {% if 1 =! 2 %}ok{% endif %}\n\n    bla\n";
    let template =
        Template::parse_with(source, &options(ErrorMode::Warn).with_line_numbers(true)).unwrap();

    let warnings: Vec<String> = template.warnings().iter().map(|w| w.to_string()).collect();
    assert_eq!(
        warnings,
        vec!["Twig syntax error (line 4): Unexpected character = in \"1 =! 2\"".to_string()]
    );
}

#[test]
fn test_parsing_strict_with_line_numbers_adds_numbers_to_lexer_errors() {
    let source = "\n    foobar\n\n    {% if 1 =! 2 %}ok{% endif %}\n\n    bla\n";
    let err =
        Template::parse_with(source, &options(ErrorMode::Strict).with_line_numbers(true)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Twig syntax error (line 4): Unexpected character = in \"1 =! 2\""
    );
}

#[test]
fn test_syntax_errors_in_nested_blocks_have_correct_line_number() {
    let source = "\n    foobar\n\n    {% if 1 != 2 %}\n      {% foo %}\n    {% endif %}\n\n    bla\n";
    let err =
        Template::parse_with(source, &options(ErrorMode::Lax).with_line_numbers(true)).unwrap_err();
    assert_eq!(err.to_string(), "Twig syntax error (line 5): Unknown tag 'foo'");
}

#[test]
fn test_strict_error_messages() {
    let err =
        Template::parse_with(" {% if 1 =! 2 %}ok{% endif %} ", &options(ErrorMode::Strict)).unwrap_err();
    assert_eq!(err.to_string(), "Twig syntax error: Unexpected character = in \"1 =! 2\"");

    let err = Template::parse_with("{{%%%}}", &options(ErrorMode::Strict)).unwrap_err();
    assert_eq!(err.to_string(), "Twig syntax error: Unexpected character % in \"{{%%%}}\"");
}

#[test]
fn test_warnings() {
    let template = Template::parse_with(
        "{% if ~~~ %}{{%%%}}{% else %}{{ hello. }}{% endif %}",
        &options(ErrorMode::Warn),
    )
    .unwrap();

    let warnings = template.warnings();
    assert_eq!(warnings.len(), 3);
    assert_eq!(warnings[0].message_without_prefix(), "Unexpected character ~ in \"~~~\"");
    assert_eq!(warnings[1].message_without_prefix(), "Unexpected character % in \"{{%%%}}\"");
    assert_eq!(
        warnings[2].message_without_prefix(),
        "Expected id but found end_of_string in \"{{ hello. }}\""
    );
    assert_eq!(template.render(&Value::Nil).unwrap(), "");
}

#[test]
fn test_warning_line_numbers() {
    let template = Template::parse_with(
        "{% if ~~~ %}\n{{%%%}}{% else %}\n{{ hello. }}{% endif %}",
        &options(ErrorMode::Warn).with_line_numbers(true),
    )
    .unwrap();

    let warnings = template.warnings();
    assert_eq!(
        warnings[0].to_string(),
        "Twig syntax error (line 1): Unexpected character ~ in \"~~~\""
    );
    assert_eq!(
        warnings[1].to_string(),
        "Twig syntax error (line 2): Unexpected character % in \"{{%%%}}\""
    );
    assert_eq!(
        warnings[2].to_string(),
        "Twig syntax error (line 3): Expected id but found end_of_string in \"{{ hello. }}\""
    );
    assert_eq!(warnings.len(), 3);
    let lines: Vec<Option<usize>> = warnings.iter().map(Error::line_number).collect();
    assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn test_render_strict_raises_the_first_error() {
    let template = Template::parse_with(
        "{{ errors.argument_error }} {{ errors.standard_error }}",
        &options(ErrorMode::Lax),
    )
    .unwrap();
    let err = template.render_strict(&assigns()).unwrap_err();
    assert!(matches!(err, Error::Argument(_)));
    assert_eq!(err.message(), "argument error");
}

#[test]
fn test_strict_mode_aborts_the_render() {
    let template =
        Template::parse_with("a {{ errors.standard_error }} b", &options(ErrorMode::Strict)).unwrap();
    let err = template.render(&assigns()).unwrap_err();
    assert_eq!(err.to_string(), "Twig error: standard error");
}

#[test]
fn test_interrupts_propagate() {
    let template = Template::parse_with("{{ errors.exception }}", &options(ErrorMode::Lax)).unwrap();
    let err = template.render(&assigns()).unwrap_err();
    assert!(err.is_interrupt());
    assert!(template.errors().is_empty());
}

#[test]
fn test_unknown_filter_policy_by_mode() {
    let lax = Template::parse_with("{{ 'x' | bogus }}", &options(ErrorMode::Lax)).unwrap();
    assert_eq!(lax.render(&Value::Nil).unwrap(), "x");

    let warn = Template::parse_with("{{ 'x' | bogus }}", &options(ErrorMode::Warn)).unwrap();
    let rendered = warn.render_with(&Value::Nil, RenderOptions::new()).unwrap();
    assert_eq!(rendered.output, "x");
    assert_eq!(rendered.warnings.len(), 1);
    assert_eq!(rendered.warnings[0].message(), "undefined filter bogus");

    let strict = Template::parse_with("{{ 'x' | bogus }}", &options(ErrorMode::Strict)).unwrap();
    let err = strict.render(&Value::from(json!({}))).unwrap_err();
    assert_eq!(err.message(), "undefined filter bogus");
}

#[test]
fn test_concurrent_renders_keep_their_own_errors() {
    let options = ParseOptions::new().with_error_mode(ErrorMode::Lax);
    let template = Template::parse_with("{{ 10 | divided_by: d }}", &options).unwrap();
    let failing = Value::from(json!({"d": 0}));
    let passing = Value::from(json!({"d": 2}));

    std::thread::scope(|scope| {
        let failing_renders = scope.spawn(|| {
            (0..200)
                .map(|_| template.render_with(&failing, RenderOptions::new()).unwrap())
                .all(|rendered| {
                    rendered.errors.len() == 1 && rendered.output == "Twig error: divided by 0"
                })
        });
        let passing_renders = scope.spawn(|| {
            (0..200)
                .map(|_| template.render_with(&passing, RenderOptions::new()).unwrap())
                .all(|rendered| rendered.errors.is_empty() && rendered.output == "5")
        });
        assert!(failing_renders.join().unwrap());
        assert!(passing_renders.join().unwrap());
    });

    // The shared list only reflects whichever render finished last
    template.render(&passing).unwrap();
    assert!(template.errors().is_empty());
    template.render(&failing).unwrap();
    assert_eq!(template.errors().len(), 1);
}
