use std::fs;
use std::path::{Path, PathBuf};

use crate::render::errors::RenderError;
use crate::render::traits::OutputIndex;

/// Where every artefact of a run lives under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn depth(&self) -> PathBuf {
        self.root.join("images_depth")
    }

    pub fn masks(&self) -> PathBuf {
        self.root.join("image_masks")
    }

    pub fn annotated(&self) -> PathBuf {
        self.root.join("annotated")
    }

    pub fn rgb_name(index: OutputIndex) -> String {
        format!("{index:06}_rgb.png")
    }

    pub fn annotated_name(index: OutputIndex) -> String {
        format!("{index:06}_annotated.png")
    }

    pub fn rgb_image(&self, index: OutputIndex) -> PathBuf {
        self.images().join(Self::rgb_name(index))
    }

    pub fn depth_image(&self, index: OutputIndex) -> PathBuf {
        self.depth().join(Self::rgb_name(index))
    }

    pub fn mask_image(&self, index: OutputIndex) -> PathBuf {
        self.masks().join(format!("{index:06}_visible_mask.png"))
    }

    pub fn annotated_image(&self, index: OutputIndex) -> PathBuf {
        self.annotated().join(Self::annotated_name(index))
    }

    pub fn knots_info(&self) -> PathBuf {
        self.images().join("knots_info.json")
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    /// Remove and recreate `dir` empty.
    pub fn recreate(dir: &Path) -> Result<(), RenderError> {
        let wrap = |source| RenderError::OutputDir {
            path: dir.to_path_buf(),
            source,
        };
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(wrap)?;
        }
        fs::create_dir_all(dir).map_err(wrap)
    }
}
