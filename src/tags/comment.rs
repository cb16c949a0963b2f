use super::{Blankness, BlockTag, BodyMode};
use crate::ast::Section;
use crate::context::Context;
use crate::error::Result;
use crate::renderer::Flow;

/// `{% comment %}...{% endcomment %}` renders nothing
#[derive(Debug)]
pub struct CommentTag;

impl BlockTag for CommentTag {
    fn ignores_unknown_tags(&self) -> bool {
        true
    }

    fn blankness(&self) -> Blankness {
        Blankness::Always
    }

    fn render(&self, _sections: &[Section], _ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        Ok(Flow::Normal)
    }
}

/// `{% raw %}...{% endraw %}` writes its body without interpreting it
#[derive(Debug)]
pub struct RawTag;

impl BlockTag for RawTag {
    fn body(&self) -> BodyMode {
        BodyMode::Raw
    }

    fn blankness(&self) -> Blankness {
        Blankness::Never
    }

    fn render(&self, sections: &[Section], _ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        for section in sections {
            out.push_str(&section.text());
        }
        Ok(Flow::Normal)
    }
}
