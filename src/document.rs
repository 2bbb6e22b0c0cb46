//! Instruction documents as owned element trees, and the walk over a chain
//! of documents linked by `Continuation` elements.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ROOT_TAG: &str = "DspInstructions";

/// Owned XML element. Only elements and their text are kept, comments and
/// processing instructions are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parse a complete document and check its root tag.
    pub fn parse_document(name: &str, source: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(source).map_err(|err| Error::DocumentLoad {
            name: name.to_owned(),
            reason: err.to_string(),
        })?;
        let root = Self::from_node(doc.root_element());
        if root.tag != ROOT_TAG {
            return Err(Error::DocumentLoad {
                name: name.to_owned(),
                reason: format!("root element is <{}>, expected <{ROOT_TAG}>", root.tag),
            });
        }
        Ok(root)
    }

    fn from_node(node: roxmltree::Node) -> Self {
        Self {
            tag: node.tag_name().name().to_owned(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_owned(), attr.value().to_owned()))
                .collect(),
            children: node
                .children()
                .filter(|child| child.is_element())
                .map(Self::from_node)
                .collect(),
            text: node
                .children()
                .filter(|child| child.is_text())
                .filter_map(|child| child.text())
                .collect(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn require(&self, name: &'static str) -> Result<&str> {
        self.attr(name).ok_or_else(|| Error::MissingAttribute {
            tag: self.tag.clone(),
            attribute: name,
        })
    }

    /// Fetch and parse a required attribute.
    pub fn parse<T: FromStr>(&self, name: &'static str) -> Result<T> {
        let value = self.require(name)?;
        value.trim().parse().map_err(|_| Error::InvalidAttribute {
            tag: self.tag.clone(),
            attribute: name,
            value: value.to_owned(),
        })
    }

    /// Fetch and parse an optional attribute.
    pub fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T> {
        match self.attr(name) {
            Some(_) => self.parse(name),
            None => Ok(default),
        }
    }

    /// Fetch a required numeric attribute. `NaN` and infinities are invalid.
    pub fn parse_finite(&self, name: &'static str) -> Result<f64> {
        let value: f64 = self.parse(name)?;
        if !value.is_finite() {
            return Err(Error::InvalidAttribute {
                tag: self.tag.clone(),
                attribute: name,
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    pub fn parse_finite_or(&self, name: &'static str, default: f64) -> Result<f64> {
        match self.attr(name) {
            Some(_) => self.parse_finite(name),
            None => Ok(default),
        }
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// The first child with the given tag, which must exist.
    pub fn require_child(&self, tag: &'static str) -> Result<&Element> {
        self.child(tag).ok_or_else(|| Error::MissingAttribute {
            tag: self.tag.clone(),
            attribute: tag,
        })
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }
}

/// Resolves document names (the initial one and those found in
/// `Continuation` elements) to parsed documents.
pub trait DocumentSource {
    fn load(&self, name: &str) -> Result<Element>;
}

/// Loads documents from files. Continuation names are resolved relative to
/// the directory of the document that references them, which is the
/// directory given here.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }

    /// Split a document path into a source for its directory and the name
    /// to load.
    pub fn for_file<P: AsRef<Path>>(path: P) -> (Self, String) {
        let path = path.as_ref();
        let dir = path.parent().map(Path::to_owned).unwrap_or_default();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (Self { dir }, name)
    }
}

impl DocumentSource for FileSource {
    fn load(&self, name: &str) -> Result<Element> {
        let path = self.dir.join(name);
        let text = std::fs::read_to_string(&path).map_err(|err| Error::DocumentLoad {
            name: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Element::parse_document(name, &text)
    }
}

/// Documents held in memory, keyed by name.
#[derive(Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, source: &str) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: &str, source: &str) {
        self.documents.insert(name.to_owned(), source.to_owned());
    }
}

impl DocumentSource for MemorySource {
    fn load(&self, name: &str) -> Result<Element> {
        let text = self.documents.get(name).ok_or_else(|| Error::DocumentLoad {
            name: name.to_owned(),
            reason: "no such document".to_owned(),
        })?;
        Element::parse_document(name, text)
    }
}

/// Returned by the per-block visitor of [`walk_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop processing the blocks of the current document. Its continuation
    /// (if any) is still followed.
    Halt,
}

/// Visit every `EventBlock` of the document chain starting at `root`, in
/// stream order. Documents are loaded lazily from a work-list that grows
/// whenever a `Continuation` is found.
pub fn walk_chain<S, F>(source: &S, root: &str, mut visit: F) -> Result<usize>
where
    S: DocumentSource + ?Sized,
    F: FnMut(&Element) -> Result<Flow>,
{
    let mut pending = VecDeque::from([root.to_owned()]);
    let mut seen = HashSet::new();
    let mut documents = 0;

    while let Some(name) = pending.pop_front() {
        if !seen.insert(name.clone()) {
            return Err(Error::ContinuationCycle(name));
        }
        let doc = source.load(&name)?;
        documents += 1;

        let mut halted = false;
        for child in &doc.children {
            match child.tag.as_str() {
                "EventBlock" if !halted => {
                    if visit(child)? == Flow::Halt {
                        halted = true;
                    }
                }
                "EventBlock" => {}
                "Continuation" => pending.push_back(child.require("File")?.to_owned()),
                "Shapes" => {}
                other => return Err(Error::UnknownInstruction(other.to_owned())),
            }
        }
    }

    Ok(documents)
}

/// Every document of the chain, in order, without interpreting its blocks.
pub fn load_chain<S: DocumentSource + ?Sized>(source: &S, root: &str) -> Result<Vec<Element>> {
    let mut pending = VecDeque::from([root.to_owned()]);
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    while let Some(name) = pending.pop_front() {
        if !seen.insert(name.clone()) {
            return Err(Error::ContinuationCycle(name));
        }
        let doc = source.load(&name)?;
        for next in doc.children_named("Continuation") {
            pending.push_back(next.require("File")?.to_owned());
        }
        documents.push(doc);
    }

    Ok(documents)
}
