//! Block store and provenance tracking
//!
//! A [`Document`] is a flat, ordered list of content blocks. Each block
//! remembers whether its current content came from the AI-assist
//! collaborator (`aiAssisted`). The store never guesses provenance: the
//! caller states it on every insert and edit, and a plain human edit clears it.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::ids::{BlockId, DocumentId, ImageId};

/// Block type tag. Unknown tags are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    Paragraph,
    Heading,
    Image,
    Table,
    List,
    Title,
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading => "heading",
            BlockKind::Image => "image",
            BlockKind::Table => "table",
            BlockKind::List => "list",
            BlockKind::Title => "title",
            BlockKind::Other(tag) => tag,
        }
    }
}

impl From<String> for BlockKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "paragraph" => BlockKind::Paragraph,
            "heading" => BlockKind::Heading,
            "image" => BlockKind::Image,
            "table" => BlockKind::Table,
            "list" => BlockKind::List,
            "title" => BlockKind::Title,
            _ => BlockKind::Other(tag),
        }
    }
}

impl From<&str> for BlockKind {
    fn from(tag: &str) -> Self {
        BlockKind::from(tag.to_string())
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: String,
    #[serde(default)]
    pub ai_assisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: ImageId,
    pub url: String,
}

/// A document in the block model. Block ids are unique and block order is
/// reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DocumentRepr")]
pub struct Document {
    id: DocumentId,
    title: String,
    blocks: Vec<Block>,
    images: Vec<ImageRef>,
}

#[derive(Deserialize)]
struct DocumentRepr {
    id: DocumentId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    blocks: Vec<Block>,
    #[serde(default)]
    images: Vec<ImageRef>,
}

impl TryFrom<DocumentRepr> for Document {
    type Error = DocumentError;

    fn try_from(repr: DocumentRepr) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        if let Some(dup) = repr.blocks.iter().find(|b| !seen.insert(&b.id)) {
            return Err(DocumentError::validation(format!(
                "duplicate block id {}",
                dup.id
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = repr.images.iter().find(|i| !seen.insert(&i.id)) {
            return Err(DocumentError::validation(format!(
                "duplicate image id {}",
                dup.id
            )));
        }
        Ok(Document {
            id: repr.id,
            title: repr.title,
            blocks: repr.blocks,
            images: repr.images,
        })
    }
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Document {
            id: DocumentId::generate(),
            title: title.into(),
            blocks: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn contains_block(&self, id: &BlockId) -> bool {
        self.block(id).is_some()
    }

    fn position(&self, id: &BlockId) -> Result<usize, DocumentError> {
        self.blocks
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| DocumentError::not_found("block", id))
    }

    /// Insert a block right after `after`, or append when `after` is `None`.
    pub fn insert_block(
        &mut self,
        after: Option<&BlockId>,
        kind: impl Into<BlockKind>,
        content: impl Into<String>,
        ai_assisted: bool,
    ) -> Result<&Block, DocumentError> {
        let index = match after {
            Some(after) => self.position(after)? + 1,
            None => self.blocks.len(),
        };
        let block = Block {
            id: BlockId::generate(),
            kind: kind.into(),
            content: content.into(),
            ai_assisted,
        };
        debug!(
            "inserting {} block {} at {} (ai_assisted={})",
            block.kind, block.id, index, ai_assisted
        );
        self.blocks.insert(index, block);
        Ok(&self.blocks[index])
    }

    /// Replace a block's content.
    ///
    /// `ai_assisted` must be true only when the new content itself came from
    /// the AI-assist collaborator; any other edit marks the block human-authored.
    pub fn edit_block(
        &mut self,
        id: &BlockId,
        content: impl Into<String>,
        ai_assisted: bool,
    ) -> Result<&Block, DocumentError> {
        let index = self.position(id)?;
        let block = &mut self.blocks[index];
        if block.ai_assisted && !ai_assisted {
            debug!("human edit clears AI provenance on block {}", id);
        }
        block.content = content.into();
        block.ai_assisted = ai_assisted;
        Ok(&self.blocks[index])
    }

    pub fn delete_block(&mut self, id: &BlockId) -> Result<Block, DocumentError> {
        let index = self.position(id)?;
        debug!("deleting block {}", id);
        Ok(self.blocks.remove(index))
    }

    /// Reorder blocks to match `order`, which must name every current block exactly once.
    pub fn reorder_blocks(&mut self, order: &[BlockId]) -> Result<(), DocumentError> {
        let mut seen = HashSet::new();
        for id in order {
            if !seen.insert(id) {
                return Err(DocumentError::validation(format!(
                    "block {} appears more than once in the new order",
                    id
                )));
            }
            if !self.contains_block(id) {
                return Err(DocumentError::validation(format!(
                    "block {} is not part of document {}",
                    id, self.id
                )));
            }
        }
        if order.len() != self.blocks.len() {
            let missing: Vec<String> = self
                .blocks
                .iter()
                .filter(|b| !seen.contains(&b.id))
                .map(|b| b.id.to_string())
                .collect();
            return Err(DocumentError::validation(format!(
                "new order omits block(s) {}",
                missing.join(", ")
            )));
        }

        let mut by_id: BTreeMap<BlockId, Block> = self
            .blocks
            .drain(..)
            .map(|b| (b.id.clone(), b))
            .collect();
        self.blocks = order.iter().filter_map(|id| by_id.remove(id)).collect();
        debug!("reordered {} block(s) in {}", self.blocks.len(), self.id);
        Ok(())
    }

    /// Ids of blocks whose current content is AI-originated, in reading order.
    pub fn ai_assisted_blocks(&self) -> Vec<&BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.ai_assisted)
            .map(|b| &b.id)
            .collect()
    }

    pub fn add_image(&mut self, url: impl Into<String>) -> &ImageRef {
        self.images.push(ImageRef {
            id: ImageId::generate(),
            url: url.into(),
        });
        let last = self.images.len() - 1;
        &self.images[last]
    }

    pub fn remove_image(&mut self, id: &ImageId) -> Result<ImageRef, DocumentError> {
        let index = self
            .images
            .iter()
            .position(|i| &i.id == id)
            .ok_or_else(|| DocumentError::not_found("image", id))?;
        Ok(self.images.remove(index))
    }
}

/// All documents open in one editing session.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    documents: BTreeMap<DocumentId, Document>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_document(&mut self, title: impl Into<String>) -> &Document {
        let document = Document::new(title);
        let id = document.id.clone();
        self.documents.entry(id).or_insert(document)
    }

    /// Adopt a loaded document.
    pub fn open(&mut self, document: Document) -> Result<&Document, DocumentError> {
        if self.documents.contains_key(&document.id) {
            return Err(DocumentError::validation(format!(
                "document {} is already open",
                document.id
            )));
        }
        let id = document.id.clone();
        Ok(&*self.documents.entry(id).or_insert(document))
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn remove_document(&mut self, id: &DocumentId) -> Result<Document, DocumentError> {
        self.documents
            .remove(id)
            .ok_or_else(|| DocumentError::not_found("document", id))
    }

    fn document_mut(&mut self, id: &DocumentId) -> Result<&mut Document, DocumentError> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| DocumentError::not_found("document", id))
    }

    /// The single open document holding `block`. An id present in more than
    /// one document is refused instead of resolved to the first match.
    fn owner_of(&mut self, block: &BlockId) -> Result<&mut Document, DocumentError> {
        let owners: Vec<DocumentId> = self
            .documents
            .iter()
            .filter(|(_, d)| d.contains_block(block))
            .map(|(id, _)| id.clone())
            .collect();
        match owners.as_slice() {
            [] => Err(DocumentError::not_found("block", block)),
            [id] => self.document_mut(id),
            many => Err(DocumentError::validation(format!(
                "block {} is ambiguous: it exists in documents {}",
                block,
                many.iter()
                    .map(DocumentId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    pub fn get_block(&self, id: &BlockId) -> Option<&Block> {
        self.documents.values().find_map(|d| d.block(id))
    }

    pub fn insert_block(
        &mut self,
        document: &DocumentId,
        after: Option<&BlockId>,
        kind: impl Into<BlockKind>,
        content: impl Into<String>,
        ai_assisted: bool,
    ) -> Result<&Block, DocumentError> {
        self.document_mut(document)?
            .insert_block(after, kind, content, ai_assisted)
    }

    pub fn edit_block(
        &mut self,
        id: &BlockId,
        content: impl Into<String>,
        ai_assisted: bool,
    ) -> Result<&Block, DocumentError> {
        self.owner_of(id)?.edit_block(id, content, ai_assisted)
    }

    pub fn delete_block(&mut self, id: &BlockId) -> Result<Block, DocumentError> {
        self.owner_of(id)?.delete_block(id)
    }

    pub fn reorder_blocks(
        &mut self,
        document: &DocumentId,
        order: &[BlockId],
    ) -> Result<(), DocumentError> {
        self.document_mut(document)?.reorder_blocks(order)
    }

    pub fn ai_assisted_blocks(&self, document: &DocumentId) -> Result<Vec<&BlockId>, DocumentError> {
        self.documents
            .get(document)
            .map(Document::ai_assisted_blocks)
            .ok_or_else(|| DocumentError::not_found("document", document))
    }

    pub fn add_image(
        &mut self,
        document: &DocumentId,
        url: impl Into<String>,
    ) -> Result<&ImageRef, DocumentError> {
        Ok(self.document_mut(document)?.add_image(url))
    }

    pub fn remove_image(
        &mut self,
        document: &DocumentId,
        image: &ImageId,
    ) -> Result<ImageRef, DocumentError> {
        self.document_mut(document)?.remove_image(image)
    }
}
