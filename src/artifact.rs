//! Artifacts and the naming contract that links one stage to the next.
//!
//! Every file the pipeline writes is described by an [`Artifact`] carrying
//! its book id, 1-based page index and the stage that produced it. Stages
//! hand each other `Vec<Artifact>` rather than bare path lists, so the
//! page index survives from the splitter to the document record without
//! any string surgery on upstream paths.
//!
//! All path construction lives in [`ArtifactLayout`]. Given the same output
//! directory, book id and page number it always yields the same path, which
//! is what makes reruns idempotent: a second run overwrites the first.
//!
//! ```text
//! Nested (default)                         Flat
//! {out}/{book}/extracted_pdfs/…pdf         {out}/…pdf
//! {out}/{book}/extracted_images/…png       {out}/extracted_images/…png
//! {out}/{book}/extracted_text/…txt         {out}/extracted_text/…txt
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const PDF_DIR: &str = "extracted_pdfs";
pub const IMAGE_DIR: &str = "extracted_images";
pub const TEXT_DIR: &str = "extracted_text";

static ARTIFACT_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<book>.+)_page_(?P<page>\d+)(?:_(?P<image>\d+))?$")
        .expect("artifact stem regex is valid")
});

/// One processing step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Split,
    Rasterize,
    Recognize,
    Assemble,
    Persist,
    Index,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Split,
        Stage::Rasterize,
        Stage::Recognize,
        Stage::Assemble,
        Stage::Persist,
        Stage::Index,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Split => "split",
            Stage::Rasterize => "rasterize",
            Stage::Recognize => "recognize",
            Stage::Assemble => "assemble",
            Stage::Persist => "persist",
            Stage::Index => "index",
        }
    }

    /// File extension of the artifacts this stage writes, if it writes
    /// per-page files.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Stage::Split => Some("pdf"),
            Stage::Rasterize => Some("png"),
            Stage::Recognize => Some("txt"),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file produced by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub stage: Stage,
    pub book_id: String,
    /// 1-based page number in the source PDF. Never changes downstream.
    pub page_index: usize,
    /// 1-based ordinal among the images rendered from one page file.
    /// Always 1 for split pages; > 1 only when the renderer fans out.
    pub image_index: usize,
    /// The upstream artifact this one was derived from.
    pub source: Option<PathBuf>,
}

impl Artifact {
    /// File stem shared by every artifact of this page/image:
    /// `{book}_page_{n}` or `{book}_page_{n}_{k}` for fan-out images.
    pub fn stem(&self) -> String {
        artifact_stem(&self.book_id, self.page_index, self.image_index)
    }

    /// Reconstruct an artifact from a bare path following the naming
    /// contract. Used when a caller only holds a positional path list.
    ///
    /// Returns `None` if the file name does not match `{book}_page_{n}[_{k}]`.
    pub fn parse(path: impl AsRef<Path>, stage: Stage) -> Option<Self> {
        let path = path.as_ref();
        let stem = path.file_stem()?.to_str()?;
        let caps = ARTIFACT_STEM.captures(stem)?;
        let page_index: usize = caps.name("page")?.as_str().parse().ok()?;
        let image_index = match caps.name("image") {
            Some(m) => m.as_str().parse().ok()?,
            None => 1,
        };
        if page_index == 0 || image_index == 0 {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            stage,
            book_id: caps.name("book")?.as_str().to_string(),
            page_index,
            image_index,
            source: None,
        })
    }
}

fn artifact_stem(book_id: &str, page_index: usize, image_index: usize) -> String {
    if image_index <= 1 {
        format!("{book_id}_page_{page_index}")
    } else {
        format!("{book_id}_page_{page_index}_{image_index}")
    }
}

/// Derive the book id from a source PDF path: the file name up to its
/// first `.` (`/in/story.v2.pdf` → `story`).
pub fn book_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let id = name.split('.').next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Title prefix of an artifact file: the first `_`-delimited token of its
/// file name (`story_page_3.txt` → `story`).
pub fn title_prefix(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default()
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Directory arrangement for intermediate artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutStyle {
    /// `{out}/{book}/extracted_*/` — one subtree per book. (default)
    #[default]
    Nested,
    /// Page PDFs directly in `{out}`, images and text in sibling
    /// `extracted_images/` and `extracted_text/` directories.
    Flat,
}

/// Owns every naming rule for one book under one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    book_id: String,
    style: LayoutStyle,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, book_id: impl Into<String>, style: LayoutStyle) -> Self {
        Self {
            root: root.into(),
            book_id: book_id.into(),
            style,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn style(&self) -> LayoutStyle {
        self.style
    }

    fn base(&self) -> PathBuf {
        match self.style {
            LayoutStyle::Nested => self.root.join(&self.book_id),
            LayoutStyle::Flat => self.root.clone(),
        }
    }

    /// Directory that holds the artifacts of `stage`.
    ///
    /// Stages that do not write per-page files map to the book base
    /// directory.
    pub fn dir_for(&self, stage: Stage) -> PathBuf {
        match (stage, self.style) {
            (Stage::Split, LayoutStyle::Nested) => self.base().join(PDF_DIR),
            (Stage::Split, LayoutStyle::Flat) => self.base(),
            (Stage::Rasterize, _) => self.base().join(IMAGE_DIR),
            (Stage::Recognize, _) => self.base().join(TEXT_DIR),
            _ => self.base(),
        }
    }

    /// Path of the artifact `stage` writes for page `page_index`
    /// (1-based) and image ordinal `image_index` (1-based).
    pub fn path_for(&self, stage: Stage, page_index: usize, image_index: usize) -> PathBuf {
        let ext = stage.extension().unwrap_or("json");
        self.dir_for(stage).join(format!(
            "{}.{ext}",
            artifact_stem(&self.book_id, page_index, image_index)
        ))
    }

    /// The same layout for a different book under the same root.
    pub fn for_book(&self, book_id: impl Into<String>) -> ArtifactLayout {
        ArtifactLayout::new(self.root.clone(), book_id, self.style)
    }

    /// Build the artifact `stage` produces from `upstream`, keeping its
    /// book id and page index.
    pub fn derive(&self, upstream: &Artifact, stage: Stage, image_index: usize) -> Artifact {
        let path = if upstream.book_id == self.book_id {
            self.path_for(stage, upstream.page_index, image_index)
        } else {
            self.for_book(upstream.book_id.as_str())
                .path_for(stage, upstream.page_index, image_index)
        };
        Artifact {
            path,
            stage,
            book_id: upstream.book_id.clone(),
            page_index: upstream.page_index,
            image_index,
            source: Some(upstream.path.clone()),
        }
    }

    /// The split-page artifact for 1-based `page_index`.
    pub fn page(&self, page_index: usize) -> Artifact {
        Artifact {
            path: self.path_for(Stage::Split, page_index, 1),
            stage: Stage::Split,
            book_id: self.book_id.clone(),
            page_index,
            image_index: 1,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_layout_paths() {
        let layout = ArtifactLayout::new("/tmp/out", "story", LayoutStyle::Nested);
        assert_eq!(
            layout.page(2).path,
            PathBuf::from("/tmp/out/story/extracted_pdfs/story_page_2.pdf")
        );
        assert_eq!(
            layout.path_for(Stage::Rasterize, 2, 1),
            PathBuf::from("/tmp/out/story/extracted_images/story_page_2.png")
        );
        assert_eq!(
            layout.path_for(Stage::Recognize, 2, 1),
            PathBuf::from("/tmp/out/story/extracted_text/story_page_2.txt")
        );
    }

    #[test]
    fn flat_layout_paths() {
        let layout = ArtifactLayout::new("/tmp/out", "story", LayoutStyle::Flat);
        assert_eq!(
            layout.page(1).path,
            PathBuf::from("/tmp/out/story_page_1.pdf")
        );
        assert_eq!(
            layout.path_for(Stage::Rasterize, 1, 1),
            PathBuf::from("/tmp/out/extracted_images/story_page_1.png")
        );
        assert_eq!(
            layout.path_for(Stage::Recognize, 1, 1),
            PathBuf::from("/tmp/out/extracted_text/story_page_1.txt")
        );
    }

    #[test]
    fn fan_out_images_get_distinct_names() {
        let layout = ArtifactLayout::new("/o", "b", LayoutStyle::Nested);
        let page = layout.page(4);
        let first = layout.derive(&page, Stage::Rasterize, 1);
        let second = layout.derive(&page, Stage::Rasterize, 2);
        assert_ne!(first.path, second.path);
        assert!(second.path.ends_with("b_page_4_2.png"));
        assert_eq!(second.page_index, 4);
        assert_eq!(second.source.as_deref(), Some(page.path.as_path()));
    }

    #[test]
    fn derive_keeps_page_index_across_stages() {
        let layout = ArtifactLayout::new("/o", "book", LayoutStyle::Nested);
        let page = layout.page(7);
        let image = layout.derive(&page, Stage::Rasterize, 1);
        let text = layout.derive(&image, Stage::Recognize, image.image_index);
        assert_eq!(text.page_index, 7);
        assert_eq!(text.stage, Stage::Recognize);
        assert_eq!(text.source.as_deref(), Some(image.path.as_path()));
    }

    #[test]
    fn derive_follows_upstream_book() {
        let layout = ArtifactLayout::new("/o", "first", LayoutStyle::Nested);
        let other = layout.for_book("second").page(1);
        let image = layout.derive(&other, Stage::Rasterize, 1);
        assert_eq!(image.book_id, "second");
        assert_eq!(
            image.path,
            PathBuf::from("/o/second/extracted_images/second_page_1.png")
        );
    }

    #[test]
    fn parse_round_trips_layout_names() {
        let layout = ArtifactLayout::new("/o", "my-book", LayoutStyle::Nested);
        let p = layout.path_for(Stage::Rasterize, 12, 3);
        let a = Artifact::parse(&p, Stage::Rasterize).expect("parses");
        assert_eq!(a.book_id, "my-book");
        assert_eq!(a.page_index, 12);
        assert_eq!(a.image_index, 3);

        assert!(Artifact::parse("/o/random.png", Stage::Rasterize).is_none());
        assert!(Artifact::parse("/o/b_page_0.png", Stage::Rasterize).is_none());
    }

    #[test]
    fn book_id_stops_at_first_dot() {
        assert_eq!(
            book_id_from_path(Path::new("/in/story.pdf")).as_deref(),
            Some("story")
        );
        assert_eq!(
            book_id_from_path(Path::new("story.v2.pdf")).as_deref(),
            Some("story")
        );
        assert_eq!(book_id_from_path(Path::new("/in/.pdf")), None);
    }

    #[test]
    fn title_prefix_is_first_underscore_token() {
        assert_eq!(title_prefix(Path::new("/x/story_page_1.txt")), "story");
        assert_eq!(title_prefix(Path::new("/x/war_and_peace_page_1.txt")), "war");
        assert_eq!(title_prefix(Path::new("/x/plain.txt")), "plain.txt");
    }
}
