//! Walking the tree
//!
//! Every node renders into the shared output buffer. A failing node has its
//! partial output removed and is replaced by whatever the error policy of the
//! context decides.

use crate::ast::Node;
use crate::context::{Context, Resource};
use crate::error::Result;

/// Control-flow signal returned by rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

/// Render a node list, stopping early on `break` / `continue`
pub fn render_nodes(nodes: &[Node], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
    ctx.increment_resource(Resource::RenderScore, nodes.len())?;

    for node in nodes {
        let start = out.len();
        let charged = ctx.usage().render_length;

        let flow = match render_node(node, ctx, out) {
            Ok(flow) => flow,
            Err(err) => {
                out.truncate(start);
                let text = ctx.handle_error(err, node.line_number())?;
                out.push_str(&text);
                Flow::Normal
            }
        };

        // Bytes already charged by nested node lists are not counted again
        let nested = ctx.usage().render_length - charged;
        ctx.increment_resource(Resource::RenderLength, (out.len() - start).saturating_sub(nested))?;

        if flow != Flow::Normal {
            return Ok(flow);
        }
    }

    Ok(Flow::Normal)
}

fn render_node(node: &Node, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
    match node {
        Node::Literal(text) => {
            out.push_str(text);
            Ok(Flow::Normal)
        }
        Node::Variable(v) => {
            v.variable.render(ctx, out)?;
            Ok(Flow::Normal)
        }
        Node::Tag(t) => t.tag.render(ctx, out),
        Node::Block(b) if b.blank => {
            let mut discarded = String::new();
            b.tag.render(&b.sections, ctx, &mut discarded)
        }
        Node::Block(b) => b.tag.render(&b.sections, ctx, out),
    }
}
