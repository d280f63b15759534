//! Phonetic-string parser.
//!
//! Consumes the marked phonetic string (posture names plus rhythm and
//! intonation control codes) and builds the posture stream of an
//! [`EventList`]. A configuration-driven rewriter may insert or replace
//! postures at category boundaries.

use std::path::Path;

use artic_model::{CategoryId, EntityKind, Model, ModelError, PostureId};

use crate::error::{ControlError, ControlResult};
use crate::event_list::EventList;
use crate::intonation_rhythm::ToneGroupKind;

const REWRITE_CONFIG_FILE: &str = "rewrite.txt";

/// Name of the synthetic utterance start/end posture.
pub const START_END_POSTURE: &str = "^";
/// Name of the synthetic utterance-final silence posture.
pub const FINAL_POSTURE: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewriterAction {
    Insert,
    InsertIfWordStart,
    ReplaceFirst,
    Nop,
}

#[derive(Debug, Clone)]
struct RewriterCommand {
    category1: CategoryId,
    action: RewriterAction,
    posture: PostureId,
}

#[derive(Debug, Clone)]
struct RewriterRule {
    category2: CategoryId,
    commands: Vec<RewriterCommand>,
}

#[derive(Debug, Default)]
struct RewriterState {
    last_posture: Option<PostureId>,
}

/// Parses phonetic strings against a model and a rewriter configuration.
///
/// The parser holds only arena handles, so one instance can serve many
/// syntheses against the model it was configured with.
#[derive(Debug, Default)]
pub struct PhoneticStringParser {
    rewriter_rules: Vec<RewriterRule>,
}

fn resolve_category(model: &Model, name: &str) -> ControlResult<CategoryId> {
    model
        .resolve_terminal(name)
        .ok_or_else(|| ControlError::Model(ModelError::lookup(EntityKind::Category, name)))
}

fn resolve_posture(model: &Model, name: &str) -> ControlResult<PostureId> {
    model
        .find_posture(name)
        .ok_or_else(|| ControlError::Model(ModelError::lookup(EntityKind::Posture, name)))
}

impl PhoneticStringParser {
    /// Creates a parser with no rewriter rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser, loading `rewrite.txt` from the given
    /// `phonetic_string_parser/` directory.
    pub fn with_config(model: &Model, dir: impl AsRef<Path>) -> ControlResult<Self> {
        let mut parser = Self::new();
        parser.load_rewriter_config(model, &dir.as_ref().join(REWRITE_CONFIG_FILE))?;
        Ok(parser)
    }

    fn load_rewriter_config(&mut self, model: &Model, path: &Path) -> ControlResult<()> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ModelError::config(display.clone(), format!("could not read: {e}"))
        })?;

        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let error = |message: String| {
                ControlError::from(ModelError::config(
                    display.clone(),
                    format!("line {}: {message}", line_number + 1),
                ))
            };

            let (pattern, command_text) = line
                .split_once('>')
                .ok_or_else(|| error("missing separator".into()))?;
            let mut pattern_fields = pattern.split_whitespace();
            let first_category = pattern_fields
                .next()
                .ok_or_else(|| error("first category not found".into()))?;
            let second_category = pattern_fields
                .next()
                .ok_or_else(|| error("second category not found".into()))?;
            if pattern_fields.next().is_some() {
                return Err(error("too many categories".into()));
            }

            let mut command_fields = command_text.split_whitespace();
            let command_name = command_fields
                .next()
                .ok_or_else(|| error("command not found".into()))?;
            let posture_name = command_fields
                .next()
                .ok_or_else(|| error("posture not found".into()))?;

            let action = match command_name {
                "insert" => RewriterAction::Insert,
                "insert_if_word_start" => RewriterAction::InsertIfWordStart,
                "replace_first" => RewriterAction::ReplaceFirst,
                "nop" => RewriterAction::Nop,
                other => return Err(error(format!("invalid command: {other}"))),
            };

            let category1 = resolve_category(model, first_category)?;
            let category2 = resolve_category(model, second_category)?;
            let posture = resolve_posture(model, posture_name)?;

            let rule_index = match self
                .rewriter_rules
                .iter()
                .position(|rule| rule.category2 == category2)
            {
                Some(position) => position,
                None => {
                    self.rewriter_rules.push(RewriterRule {
                        category2,
                        commands: Vec::new(),
                    });
                    self.rewriter_rules.len() - 1
                }
            };
            let rule = &mut self.rewriter_rules[rule_index];
            if rule.commands.iter().any(|c| c.category1 == category1) {
                return Err(error("duplicate category pair".into()));
            }
            rule.commands.push(RewriterCommand {
                category1,
                action,
                posture,
            });
        }
        Ok(())
    }

    fn rewrite(
        &self,
        next_posture: PostureId,
        word_marker: bool,
        state: &mut RewriterState,
        list: &mut EventList<'_>,
    ) -> ControlResult<()> {
        let Some(last) = state.last_posture else {
            state.last_posture = Some(next_posture);
            return Ok(());
        };

        let model = list.model();
        let next = model.posture(next_posture)?;
        let previous = model.posture(last)?;
        for rule in &self.rewriter_rules {
            if !next.is_member_of(rule.category2) {
                continue;
            }
            if let Some(command) = rule
                .commands
                .iter()
                .find(|command| previous.is_member_of(command.category1))
            {
                match command.action {
                    RewriterAction::Insert => {
                        list.new_posture_with(command.posture, false);
                    }
                    RewriterAction::InsertIfWordStart => {
                        if word_marker {
                            list.new_posture_with(command.posture, false);
                        }
                    }
                    RewriterAction::ReplaceFirst => {
                        list.replace_current_posture(command.posture);
                    }
                    RewriterAction::Nop => {}
                }
                break;
            }
        }

        state.last_posture = Some(next_posture);
        Ok(())
    }

    /// Parses a phonetic string into the event list's posture stream.
    ///
    /// The utterance is wrapped in synthetic postures: `^` at both ends
    /// and `#` before the trailing `^`.
    pub fn parse(&self, input: &str, list: &mut EventList<'_>) -> ControlResult<()> {
        let model = list.model();
        let bytes = input.as_bytes();
        let len = bytes.len();
        let mut index = 0;

        let mut last_foot = false;
        let mut marked_foot = false;
        let mut word_marker = false;
        let mut rule_tempo = 1.0;
        let mut posture_tempo = 1.0;
        let mut state = RewriterState::default();

        let start_end = resolve_posture(model, START_END_POSTURE)?;
        let final_posture = resolve_posture(model, FINAL_POSTURE)?;
        list.new_posture_with(start_end, false);

        let skip_separators = |index: &mut usize| {
            while *index < len && (bytes[*index].is_ascii_whitespace() || bytes[*index] == b'_') {
                *index += 1;
            }
        };
        let get_number = |index: &mut usize| -> &str {
            let start = *index;
            while *index < len && (bytes[*index].is_ascii_digit() || bytes[*index] == b'.') {
                *index += 1;
            }
            &input[start..*index]
        };

        while index < len {
            skip_separators(&mut index);
            if index >= len {
                break;
            }

            match bytes[index] {
                b'/' => {
                    index += 1;
                    let code = if index < len { bytes[index] } else { 0 };
                    match code {
                        b'0' => {
                            index += 1;
                            list.set_current_tone_group_kind(ToneGroupKind::Statement);
                        }
                        b'1' => {
                            index += 1;
                            list.set_current_tone_group_kind(ToneGroupKind::Exclamation);
                        }
                        b'2' => {
                            index += 1;
                            list.set_current_tone_group_kind(ToneGroupKind::Question);
                        }
                        b'3' => {
                            index += 1;
                            list.set_current_tone_group_kind(ToneGroupKind::Continuation);
                        }
                        b'4' => {
                            index += 1;
                            list.set_current_tone_group_kind(ToneGroupKind::Semicolon);
                        }
                        b'_' => {
                            list.new_foot();
                            if last_foot {
                                list.set_current_foot_last();
                            }
                            last_foot = false;
                            marked_foot = false;
                            index += 1;
                        }
                        b'*' => {
                            list.new_foot();
                            list.set_current_foot_marked();
                            if last_foot {
                                list.set_current_foot_last();
                            }
                            last_foot = false;
                            marked_foot = true;
                            index += 1;
                        }
                        b'/' => {
                            index += 1;
                            list.new_tone_group();
                        }
                        b'c' => {
                            // Chunk marker, ignored.
                            index += 1;
                        }
                        b'l' => {
                            index += 1;
                            last_foot = true;
                        }
                        b'w' => {
                            index += 1;
                            word_marker = true;
                        }
                        b'f' => {
                            index += 1;
                            skip_separators(&mut index);
                            let base = index;
                            let number = get_number(&mut index);
                            let tempo: f64 = number.parse().map_err(|_| {
                                ControlError::phonetic(base, "missing foot tempo value")
                            })?;
                            list.set_current_foot_tempo(tempo);
                        }
                        b'r' => {
                            index += 1;
                            skip_separators(&mut index);
                            let base = index;
                            let number = get_number(&mut index);
                            rule_tempo = number.parse().map_err(|_| {
                                ControlError::phonetic(base, "missing rule tempo value")
                            })?;
                        }
                        b'"' => {
                            // Secondary stress, ignored.
                            index += 1;
                        }
                        other => {
                            return Err(ControlError::phonetic(
                                index.saturating_sub(1),
                                format!(
                                    "unknown escape sequence \"/{}\"",
                                    (other as char).escape_default()
                                ),
                            ));
                        }
                    }
                }
                b'.' => {
                    list.set_current_posture_syllable();
                    index += 1;
                }
                b'0'..=b'9' => {
                    let base = index;
                    let number = get_number(&mut index);
                    posture_tempo = number
                        .parse()
                        .map_err(|_| ControlError::phonetic(base, "invalid tempo value"))?;
                }
                _ => {
                    let base = index;
                    while index < len
                        && (bytes[index].is_ascii_alphabetic()
                            || bytes[index] == b'^'
                            || bytes[index] == b'#')
                    {
                        index += 1;
                    }
                    if index == base {
                        return Err(ControlError::phonetic(base, "missing posture"));
                    }
                    let mut name = input[base..index].to_string();
                    let mut marked = false;
                    if index < len && bytes[index] == b'\'' {
                        index += 1;
                        marked = true;
                    }
                    if marked_foot {
                        marked = true;
                    }
                    if marked {
                        name.push('\'');
                    }

                    let posture = model.find_posture(&name).ok_or_else(|| {
                        ControlError::phonetic(base, format!("posture \"{name}\" not found"))
                    })?;

                    self.rewrite(posture, word_marker, &mut state, list)?;

                    list.new_posture_with(posture, marked);
                    list.set_current_posture_tempo(posture_tempo);
                    list.set_current_posture_rule_tempo(rule_tempo);

                    posture_tempo = 1.0;
                    rule_tempo = 1.0;
                    word_marker = false;
                }
            }
        }

        list.new_posture_with(final_posture, false);
        list.new_posture_with(start_end, false);
        Ok(())
    }
}
