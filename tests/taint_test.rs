use serde_json::json;
use twig::prelude::*;

fn build(source: &str, mode: TaintMode) -> Template {
    let options = ParseOptions::new().with_error_mode(ErrorMode::Lax);
    let mut template = Template::parse_with(source, &options).unwrap();
    template.set_taint_mode(mode);
    template
}

fn assigns() -> Value {
    let mut map = twig::value::Object::new();
    map.insert("user_input".to_string(), Value::tainted("<script>"));
    map.insert("list".to_string(), Value::tainted(Value::from(json!(["a", "b"]))));
    Value::Object(map)
}

#[test]
fn test_off_ignores_taint() {
    let template = build("{{ user_input }}", TaintMode::Off);
    let rendered = template.render_with(&assigns(), RenderOptions::new()).unwrap();
    assert_eq!(rendered.output, "<script>");
    assert!(rendered.warnings.is_empty());
}

#[test]
fn test_warn_records_a_warning() {
    let template = build("{{ user_input }}", TaintMode::Warn);
    let rendered = template.render_with(&assigns(), RenderOptions::new()).unwrap();
    assert_eq!(rendered.output, "<script>");
    assert_eq!(rendered.warnings.len(), 1);
    assert!(rendered.warnings[0].message().contains("tainted"));
}

#[test]
fn test_error_aborts_the_render() {
    let template = build("before {{ user_input }} after", TaintMode::Error);
    let err = template.render(&assigns()).unwrap_err();
    assert_eq!(err.error_code(), "E_TAINTED");
    assert!(err.to_string().contains("tainted"));
}

#[test]
fn test_escaping_clears_taint() {
    let template = build("{{ user_input | escape }}", TaintMode::Error);
    assert_eq!(template.render(&assigns()).unwrap(), "&lt;script&gt;");

    let template = build("{{ user_input | h }}", TaintMode::Error);
    assert_eq!(template.render(&assigns()).unwrap(), "&lt;script&gt;");
}

#[test]
fn test_taint_survives_other_filters() {
    let template = build("{{ user_input | upcase }}", TaintMode::Error);
    assert!(template.render(&assigns()).is_err());

    let template = build("{{ user_input | upcase | escape }}", TaintMode::Error);
    assert_eq!(template.render(&assigns()).unwrap(), "&lt;SCRIPT&gt;");
}

#[test]
fn test_loop_items_of_tainted_collections_are_tainted() {
    let template = build("{% for x in list %}{{ x }}{% endfor %}", TaintMode::Error);
    assert!(template.render(&assigns()).is_err());

    let template = build("{% for x in list %}{{ x | escape }}{% endfor %}", TaintMode::Error);
    assert_eq!(template.render(&assigns()).unwrap(), "ab");
}

#[test]
fn test_untainted_values_are_never_checked() {
    let template = build("{{ plain }}", TaintMode::Error);
    assert_eq!(template.render(&Value::from(json!({"plain": "<b>"}))).unwrap(), "<b>");
}
