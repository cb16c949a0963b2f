//! Parsed template tree
//!
//! Blocks keep their body split into [`Section`]s: the first one belongs to
//! the opening tag, and each intermediate delimiter the block accepts (such
//! as `else`) starts another.

use crate::tags::{Blankness, BlockTag, Tag};
use crate::variable::Variable;

#[derive(Debug)]
pub enum Node {
    Literal(String),
    Variable(VariableNode),
    Tag(TagNode),
    Block(BlockNode),
}

#[derive(Debug)]
pub struct VariableNode {
    pub variable: Variable,
    pub markup: String,
    pub line_number: usize,
}

#[derive(Debug)]
pub struct TagNode {
    pub name: String,
    pub markup: String,
    pub line_number: usize,
    pub tag: Box<dyn Tag>,
}

#[derive(Debug)]
pub struct BlockNode {
    pub name: String,
    pub markup: String,
    pub line_number: usize,
    pub sections: Vec<Section>,
    pub tag: Box<dyn BlockTag>,
    /// Output of blank blocks is discarded
    pub blank: bool,
}

#[derive(Debug)]
pub struct Section {
    pub delimiter: String,
    pub markup: String,
    pub line_number: usize,
    pub nodes: Vec<Node>,
}

impl Section {
    pub fn new(delimiter: impl Into<String>, markup: impl Into<String>, line_number: usize) -> Self {
        Self {
            delimiter: delimiter.into(),
            markup: markup.into(),
            line_number,
            nodes: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.nodes.iter().all(Node::is_blank)
    }

    /// Raw text of a verbatim body
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl BlockNode {
    pub fn new(
        name: String,
        markup: String,
        line_number: usize,
        sections: Vec<Section>,
        tag: Box<dyn BlockTag>,
    ) -> Self {
        let blank = match tag.blankness() {
            Blankness::Always => true,
            Blankness::Never => false,
            Blankness::Body => sections.iter().all(Section::is_blank),
        };
        Self {
            name,
            markup,
            line_number,
            sections,
            tag,
            blank,
        }
    }
}

impl Node {
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Node::Literal(_) => None,
            Node::Variable(v) => Some(v.line_number),
            Node::Tag(t) => Some(t.line_number),
            Node::Block(b) => Some(b.line_number),
        }
    }

    /// Whitespace-only text and blank tags produce no visible output
    pub fn is_blank(&self) -> bool {
        match self {
            Node::Literal(text) => text.trim().is_empty(),
            Node::Variable(_) => false,
            Node::Tag(t) => t.tag.blank(),
            Node::Block(b) => b.blank,
        }
    }

    /// Tag or block name; `None` for text and variables
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Tag(t) => Some(&t.name),
            Node::Block(b) => Some(&b.name),
            _ => None,
        }
    }

    /// Direct children, section by section
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Block(b) => b.sections.iter().flat_map(|s| s.nodes.iter()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Root of a parsed template
#[derive(Debug, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn is_blank(&self) -> bool {
        self.nodes.iter().all(Node::is_blank)
    }
}
