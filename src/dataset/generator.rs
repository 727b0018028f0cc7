use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::annotate::AnnotationMap;
use crate::choreo::{Choreographer, KnotKind, LoosenRecord, Phase};
use crate::config::{GenerationConfig, RopeParams};
use crate::dataset::errors::DatasetError;
use crate::dataset::session::Session;
use crate::env::{Frame, RopeEnv};
use crate::render::{Layout, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub phase: Phase,
    pub start_frame: Frame,
    pub end_frame: Frame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub index: usize,
    pub knot_kind: KnotKind,
    pub start_frame: Frame,
    pub end_frame: Frame,
    /// Frames skipped for rendering during the episode.
    pub render_offset_delta: i64,
    pub steps: Vec<StepRecord>,
    pub loosens: Vec<LoosenRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub run_id: Uuid,
    pub episodes: Vec<EpisodeRecord>,
    pub frames_simulated: u64,
    pub frames_rendered: u64,
}

/// Runs episodes back to back against one scene and writes the dataset.
pub struct Generator<E: RopeEnv> {
    config: GenerationConfig,
    choreographer: Choreographer,
    session: Session<E>,
}

impl<E: RopeEnv> Generator<E> {
    /// Fails when the scene's rope does not have the configured segment
    /// count.
    pub fn new(
        env: E,
        renderer: Box<dyn Renderer>,
        params: &RopeParams,
        config: GenerationConfig,
    ) -> Result<Self, DatasetError> {
        let actual = env.num_segments();
        if actual != params.num_segments {
            return Err(DatasetError::SegmentCountMismatch {
                expected: params.num_segments,
                actual,
            });
        }
        Ok(Self {
            choreographer: Choreographer::new(config.choreo),
            session: Session::new(env, renderer, &config),
            config,
        })
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    pub fn annotations(&self) -> &AnnotationMap {
        self.session.exporter().map()
    }

    /// Run every configured episode. The annotation map and manifest are
    /// written only after the last episode completes.
    pub fn run(&mut self) -> Result<DatasetSummary, DatasetError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, episodes = self.config.episodes, "generation started");

        let mut episodes = Vec::with_capacity(self.config.episodes);
        for index in 0..self.config.episodes {
            let record = self.run_episode(index)?;
            episodes.push(record);
        }
        self.session.close()?;

        let summary = DatasetSummary {
            run_id,
            episodes,
            frames_simulated: self.session.frames_simulated(),
            frames_rendered: self.session.rendered().len() as u64,
        };
        if let Some(root) = &self.config.output_dir {
            self.write(&Layout::new(root), &summary)?;
        }
        info!(
            %run_id,
            frames_simulated = summary.frames_simulated,
            frames_rendered = summary.frames_rendered,
            "generation finished"
        );
        Ok(summary)
    }

    fn run_episode(&mut self, index: usize) -> Result<EpisodeRecord, DatasetError> {
        let kind = self
            .config
            .selection
            .pick(index, self.session.rng_mut())
            .ok_or(DatasetError::NoKnotKinds)?;
        let _span = info_span!("episode", episode = index, knot = %kind).entered();
        let offset_before = self.session.ledger().offset();
        let choreo = &self.choreographer;
        let stage = &mut self.session;

        let mut steps = Vec::new();
        let tied = choreo.tie(stage, kind)?;
        steps.push(StepRecord {
            phase: Phase::Tie,
            start_frame: 0,
            end_frame: tied,
        });
        let straight = choreo.straighten(stage, tied)?;
        steps.push(StepRecord {
            phase: Phase::Straighten,
            start_frame: tied,
            end_frame: straight,
        });

        let mut end = straight;
        let mut loosens = Vec::with_capacity(self.config.num_loosens);
        for _ in 0..self.config.num_loosens {
            let (next, record) = choreo.loosen(stage, end)?;
            steps.push(StepRecord {
                phase: Phase::Loosen,
                start_frame: end,
                end_frame: next,
            });
            loosens.push(record);
            end = next;
        }

        let render_offset_delta = stage.ledger().offset() - offset_before;
        stage.finish_episode(end)?;
        info!(end, render_offset_delta, "episode finished");

        Ok(EpisodeRecord {
            index,
            knot_kind: kind,
            start_frame: 0,
            end_frame: end,
            render_offset_delta,
            steps,
            loosens,
        })
    }

    fn write(&self, layout: &Layout, summary: &DatasetSummary) -> Result<(), DatasetError> {
        self.session.exporter().write_json(layout.knots_info())?;
        write_manifest(&layout.manifest(), summary)
    }
}

fn write_manifest(path: &Path, summary: &DatasetSummary) -> Result<(), DatasetError> {
    let json = serde_json::to_string_pretty(summary).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}
