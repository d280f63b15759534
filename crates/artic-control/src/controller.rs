//! The synthesis controller.
//!
//! Owns the loaded model and configuration and runs the pipeline: parse
//! the phonetic string, apply the rhythm model, match and apply rules,
//! layer the intonation contour, and render parameter frames. The model
//! is read-only during synthesis, so one controller can serve parallel
//! syntheses as long as each call site owns its own seed.

use std::path::Path;

use artic_model::{load_model_xml, Model, VoicePackIndex};
use tracing::debug;

use crate::config::ControlConfig;
use crate::drift::DriftGenerator;
use crate::error::ControlResult;
use crate::event_list::EventList;
use crate::frame::write_frames;
use crate::intonation_rhythm::IntonationRhythm;
use crate::pho1::Pho1Parser;
use crate::phonetic_parser::PhoneticStringParser;
use crate::rng::create_component_rng;

/// The top-level synthesis driver.
#[derive(Debug)]
pub struct Controller {
    model: Model,
    config: ControlConfig,
    intonation_rhythm: IntonationRhythm,
    phonetic_parser: PhoneticStringParser,
    pho1_parser: Option<Pho1Parser>,
}

impl Controller {
    /// Loads a controller from a voice-pack directory.
    pub fn from_voice_pack(dir: impl AsRef<Path>) -> ControlResult<Self> {
        let index = VoicePackIndex::load(dir)?;
        let model = load_model_xml(index.entry("model_file")?)?;
        let config = ControlConfig::load(index.entry("control_file")?)?;
        let intonation_rhythm = IntonationRhythm::load(index.entry("intonation_rhythm_dir")?)?;
        let phonetic_parser =
            PhoneticStringParser::with_config(&model, index.entry("phonetic_parser_dir")?)?;
        let pho1_parser = match index.entry_opt("pho1_parser_dir") {
            Some(dir) => Some(Pho1Parser::with_config(dir)?),
            None => None,
        };
        debug!(dir = %index.dir().display(), "voice pack loaded");
        Ok(Self {
            model,
            config,
            intonation_rhythm,
            phonetic_parser,
            pho1_parser,
        })
    }

    /// Creates a controller from already-built parts (no rewriter rules,
    /// no pho1 phoneme map).
    pub fn new(model: Model, config: ControlConfig, intonation_rhythm: IntonationRhythm) -> Self {
        Self {
            model,
            config,
            intonation_rhythm,
            phonetic_parser: PhoneticStringParser::new(),
            pho1_parser: None,
        }
    }

    /// The loaded model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The controller settings.
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// The controller settings, mutably.
    pub fn config_mut(&mut self) -> &mut ControlConfig {
        &mut self.config
    }

    /// The intonation/rhythm configuration, mutably (fixed intonation
    /// parameters are set through this).
    pub fn intonation_rhythm_mut(&mut self) -> &mut IntonationRhythm {
        &mut self.intonation_rhythm
    }

    fn drift_generator(&self) -> Option<DriftGenerator> {
        self.config.intonation_drift.then(|| {
            DriftGenerator::new(
                self.config.drift_deviation,
                f64::from(self.config.control_rate),
                self.config.drift_lowpass_cutoff,
            )
        })
    }

    /// Synthesizes a phonetic string into parameter frames.
    ///
    /// `seed` drives all randomness (random intonation selection and
    /// perturbations); identical inputs and seeds produce identical
    /// frames.
    pub fn synthesize_phonetic_string(
        &self,
        phonetic_string: &str,
        seed: u32,
    ) -> ControlResult<Vec<Vec<f32>>> {
        let mut list = EventList::new(&self.model);
        self.phonetic_parser.parse(phonetic_string, &mut list)?;
        list.apply_rhythm(&self.intonation_rhythm, self.config.global_tempo);
        list.generate_event_list()?;

        let mut rng = create_component_rng(seed, "intonation");
        list.apply_intonation(&self.intonation_rhythm, &self.config, &mut rng)?;

        let mut drift = self.drift_generator();
        let frames = list.generate_output(&self.config, drift.as_mut());
        debug!(frames = frames.len(), rules = list.number_of_rules(), "synthesis done");
        Ok(frames)
    }

    /// Synthesizes pho1 input into parameter frames.
    ///
    /// Pho1 timing comes from the input durations; the rhythm model and
    /// the tone-group intonation pass are bypassed, the input's own pitch
    /// targets forming the contour instead.
    pub fn synthesize_pho1(&self, pho1: &str) -> ControlResult<Vec<Vec<f32>>> {
        let default_parser;
        let parser = match &self.pho1_parser {
            Some(parser) => parser,
            None => {
                default_parser = Pho1Parser::new();
                &default_parser
            }
        };

        let mut list = EventList::new(&self.model);
        parser.parse(
            pho1,
            &mut list,
            self.config.pitch_mean,
            self.config.global_tempo,
        )?;
        list.prepare_macro_intonation_interpolation(self.config.smooth_intonation);

        let mut drift = self.drift_generator();
        let frames = list.generate_output(&self.config, drift.as_mut());
        Ok(frames)
    }

    /// Synthesizes a phonetic string and writes the frames as text.
    pub fn synthesize_to_writer(
        &self,
        phonetic_string: &str,
        seed: u32,
        writer: &mut impl std::io::Write,
    ) -> ControlResult<()> {
        let frames = self.synthesize_phonetic_string(phonetic_string, seed)?;
        write_frames(&frames, writer)
    }
}
