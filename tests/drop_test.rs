use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::Arc;
use twig::prelude::*;

struct ContextDrop;

static CONTEXT_DROP: Lazy<Arc<Descriptor<ContextDrop>>> = Lazy::new(|| {
    Descriptor::new("ContextDrop")
        .member("scopes", |_, ctx| Ok(Value::from(ctx.scope_depth())))
        .member("scopes_as_array", |_, ctx| {
            Ok(Value::Array((1..=ctx.scope_depth()).map(Value::from).collect()))
        })
        .member("loop_pos", |_, ctx| ctx.get("forloop.index"))
        .fallback(|_, name, ctx| ctx.get(name))
        .build()
});

impl Sandboxed for ContextDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        CONTEXT_DROP.clone()
    }
}

struct TextDrop;

static TEXT_DROP: Lazy<Arc<Descriptor<TextDrop>>> = Lazy::new(|| {
    Descriptor::new("TextDrop")
        .field("array", |_| Value::from(json!(["text1", "text2"])))
        .field("text", |_| Value::from("text1"))
        .build()
});

impl Sandboxed for TextDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        TEXT_DROP.clone()
    }
}

struct CatchallDrop;

static CATCHALL_DROP: Lazy<Arc<Descriptor<CatchallDrop>>> = Lazy::new(|| {
    Descriptor::new("CatchallDrop")
        .fallback(|_, name, _| Ok(Value::from(format!("method: {}", name))))
        .build()
});

impl Sandboxed for CatchallDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        CATCHALL_DROP.clone()
    }
}

struct ProductDrop;

static PRODUCT_DROP: Lazy<Arc<Descriptor<ProductDrop>>> = Lazy::new(|| {
    Descriptor::new("ProductDrop")
        .field("texts", |_| Value::host(TextDrop))
        .field("catchall", |_| Value::host(CatchallDrop))
        .field("context", |_| Value::host(ContextDrop))
        .field("user_input", |_| Value::tainted("foo"))
        .build()
});

impl Sandboxed for ProductDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        PRODUCT_DROP.clone()
    }
}

struct EnumerableDrop;

static ENUMERABLE_DROP: Lazy<Arc<Descriptor<EnumerableDrop>>> = Lazy::new(|| {
    Descriptor::new("EnumerableDrop")
        .field("size", |_| Value::from(3))
        .field("first", |_| Value::from(1))
        .field("count", |_| Value::from(3))
        .field("min", |_| Value::from(1))
        .field("max", |_| Value::from(3))
        .fallback(|_, name, _| Ok(Value::from(name)))
        .iterate(|_, _| Ok(vec![Value::from(1), Value::from(2), Value::from(3)]))
        .build()
});

impl Sandboxed for EnumerableDrop {
    fn descriptor() -> Arc<Descriptor<Self>> {
        ENUMERABLE_DROP.clone()
    }
}

fn render(source: &str, assigns: Vec<(&str, Value)>) -> String {
    let mut map = twig::value::Object::new();
    for (name, value) in assigns {
        map.insert(name.to_string(), value);
    }
    let options = ParseOptions::new().with_error_mode(ErrorMode::Strict);
    let mut template = Template::parse_with(source, &options).unwrap();
    template.set_taint_mode(TaintMode::Off);
    template.render_strict(&Value::Object(map)).unwrap()
}

fn product() -> Vec<(&'static str, Value)> {
    vec![("product", Value::host(ProductDrop))]
}

#[test]
fn test_product_drop() {
    assert_eq!(render("  ", product()), "  ");
}

#[test]
fn test_drop_does_only_respond_to_allowed_members() {
    for source in [
        "{{ product.inspect }}",
        "{{ product.pretty_inspect }}",
        "{{ product.whatever }}",
        "{{ product | map: \"inspect\" }}",
        "{{ product | map: \"pretty_inspect\" }}",
        "{{ product | map: \"whatever\" }}",
    ] {
        assert_eq!(render(source, product()), "", "{}", source);
    }
}

#[test]
fn test_drops_respond_to_to_twig() {
    assert_eq!(render("{{ product.to_twig.texts.text }}", product()), "text1");
    assert_eq!(
        render(
            "{{ product | map: \"to_twig\" | map: \"texts\" | map: \"text\" }}",
            product()
        ),
        "text1"
    );
}

#[test]
fn test_text_drop() {
    assert_eq!(render(" {{ product.texts.text }} ", product()), " text1 ");
}

#[test]
fn test_unknown_method() {
    assert_eq!(render(" {{ product.catchall.unknown }} ", product()), " method: unknown ");
}

#[test]
fn test_integer_argument_drop() {
    assert_eq!(render(" {{ product.catchall[8] }} ", product()), " method: 8 ");
}

#[test]
fn test_text_array_drop() {
    assert_eq!(
        render("{% for text in product.texts.array %} {{text}} {% endfor %}", product()),
        " text1  text2 "
    );
}

#[test]
fn test_context_drop() {
    assert_eq!(
        render(
            " {{ context.bar }} ",
            vec![("context", Value::host(ContextDrop)), ("bar", Value::from("carrot"))]
        ),
        " carrot "
    );
}

#[test]
fn test_nested_context_drop() {
    let mut assigns = product();
    assigns.push(("foo", Value::from("monkey")));
    assert_eq!(render(" {{ product.context.foo }} ", assigns), " monkey ");
}

#[test]
fn test_object_members_not_allowed() {
    for member in ["dup", "clone", "singleton_class", "eval", "class_eval", "inspect"] {
        let source = format!(" {{{{ product.{} }}}} ", member);
        assert_eq!(render(&source, product()), "  ", "{}", member);
    }
}

#[test]
fn test_scope() {
    let assigns = || {
        vec![
            ("context", Value::host(ContextDrop)),
            ("dummy", Value::from(json!([1]))),
        ]
    };
    assert_eq!(render("{{ context.scopes }}", assigns()), "1");
    assert_eq!(
        render("{%for i in dummy%}{{ context.scopes }}{%endfor%}", assigns()),
        "2"
    );
    assert_eq!(
        render(
            "{%for i in dummy%}{%for i in dummy%}{{ context.scopes }}{%endfor%}{%endfor%}",
            assigns()
        ),
        "3"
    );
}

#[test]
fn test_scope_with_sets() {
    let assigns = || {
        vec![
            ("context", Value::host(ContextDrop)),
            ("dummy", Value::from(json!([1]))),
        ]
    };
    assert_eq!(render("{% set a = \"variable\"%}{{a}}", assigns()), "variable");
    assert_eq!(
        render("{% set a = \"variable\"%}{%for i in dummy%}{{a}}{%endfor%}", assigns()),
        "variable"
    );
    assert_eq!(render("{% set header_gif = \"test\"%}{{header_gif}}", assigns()), "test");
    assert_eq!(render("{% set header_gif = 'test'%}{{header_gif}}", assigns()), "test");
}

#[test]
fn test_scope_from_tags() {
    let assigns = || {
        vec![
            ("context", Value::host(ContextDrop)),
            ("dummy", Value::from(json!([1]))),
        ]
    };
    assert_eq!(
        render("{% for i in context.scopes_as_array %}{{i}}{% endfor %}", assigns()),
        "1"
    );
    assert_eq!(
        render(
            "{%for a in dummy%}{% for i in context.scopes_as_array %}{{i}}{% endfor %}{% endfor %}",
            assigns()
        ),
        "12"
    );
}

#[test]
fn test_access_context_from_drop() {
    assert_eq!(
        render(
            "{%for a in dummy%}{{ context.loop_pos }}{% endfor %}",
            vec![
                ("context", Value::host(ContextDrop)),
                ("dummy", Value::from(json!([1, 2, 3]))),
            ]
        ),
        "123"
    );
}

#[test]
fn test_enumerable_drop() {
    let collection = || vec![("collection", Value::host(EnumerableDrop))];
    assert_eq!(render("{% for c in collection %}{{c}}{% endfor %}", collection()), "123");
    assert_eq!(render("{{collection.size}}", collection()), "3");
    for member in ["select", "each", "map", "cycle"] {
        let dotted = format!("{{{{collection.{}}}}}", member);
        let indexed = format!("{{{{collection[\"{}\"]}}}}", member);
        assert_eq!(render(&dotted, collection()), member);
        assert_eq!(render(&indexed, collection()), member);
    }
    for member in ["count", "max"] {
        assert_eq!(render(&format!("{{{{collection.{}}}}}", member), collection()), "3");
    }
    for member in ["min", "first"] {
        assert_eq!(render(&format!("{{{{collection.{}}}}}", member), collection()), "1");
    }
}

#[test]
fn test_empty_and_nil_key_access() {
    let mut assigns = product();
    assigns.push(("value", Value::from("")));
    assert_eq!(render("{{ product[value] }}", assigns), "");

    let mut assigns = product();
    assigns.push(("value", Value::Nil));
    assert_eq!(render("{{ product[value] }}", assigns), "");
}

#[test]
fn test_default_output_is_the_type_label() {
    assert_eq!(render("{{ product }}", product()), "ProductDrop");
    assert_eq!(
        render("{{ collection }}", vec![("collection", Value::host(EnumerableDrop))]),
        "EnumerableDrop"
    );
}
