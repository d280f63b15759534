//! XML model file reader.
//!
//! The model file has a fixed top-level element order: `categories`,
//! `parameters`, `symbols`, `postures`, `equations`, `transitions`,
//! `special-transitions`, `rules`. Equations, transitions, and rules are
//! grouped; cross-references are by name in the file and resolved to arena
//! handles while loading.

use std::path::Path;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::category::Category;
use crate::equation::Equation;
use crate::error::{EntityKind, ModelError, ModelResult};
use crate::model::Model;
use crate::param::{posture_symbol, Parameter, Symbol};
use crate::rule::Rule;
use crate::transition::{
    PointOrSlope, PointTime, SlopeRatio, Transition, TransitionId, TransitionPoint, TransitionType,
};

/// Loads and validates a model from an XML file.
pub fn load_model_xml(path: impl AsRef<Path>) -> ModelResult<Model> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ModelError::config(path.display().to_string(), format!("could not read: {e}"))
    })?;
    let model = parse_model_xml(&path.display().to_string(), &text)?;
    model.validate()?;
    Ok(model)
}

/// Parses a model from XML text. `path` is used in error messages only.
pub fn parse_model_xml(path: &str, text: &str) -> ModelResult<Model> {
    let document = Document::parse(text)
        .map_err(|e| ModelError::config(path, format!("malformed XML: {e}")))?;
    let root = document.root_element();

    let mut reader = Reader {
        path,
        model: Model::new(),
    };

    for section in element_children(&root) {
        match section.tag_name().name() {
            "categories" => reader.read_categories(&section)?,
            "parameters" => reader.read_parameters(&section)?,
            "symbols" => reader.read_symbols(&section)?,
            "postures" => reader.read_postures(&section)?,
            "equations" => reader.read_equation_groups(&section)?,
            "transitions" => reader.read_transition_groups(&section, false)?,
            "special-transitions" => reader.read_transition_groups(&section, true)?,
            "rules" => reader.read_rules(&section)?,
            other => {
                return Err(reader.error(format!("unexpected element: {other}")));
            }
        }
    }

    debug!(path, "model file parsed");
    Ok(reader.model)
}

fn element_children<'a, 'input>(node: &Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

struct Reader<'a> {
    path: &'a str,
    model: Model,
}

impl Reader<'_> {
    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::config(self.path, message)
    }

    fn attr<'n>(&self, node: &'n Node<'_, '_>, name: &str) -> ModelResult<&'n str> {
        node.attribute(name).ok_or_else(|| {
            self.error(format!(
                "element {} is missing attribute {name}",
                node.tag_name().name()
            ))
        })
    }

    fn attr_f32(&self, node: &Node<'_, '_>, name: &str) -> ModelResult<f32> {
        let raw = self.attr(node, name)?;
        raw.parse()
            .map_err(|_| self.error(format!("invalid number in attribute {name}: {raw}")))
    }

    fn comment_child(&self, node: &Node<'_, '_>) -> Option<String> {
        element_children(node)
            .find(|n| n.tag_name().name() == "comment")
            .and_then(|n| n.text())
            .map(str::to_string)
    }

    fn read_categories(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for node in element_children(section) {
            let name = self.attr(&node, "name")?;
            let mut category = Category::new(name);
            category.set_comment(self.comment_child(&node));
            self.model.add_category(category)?;
        }
        Ok(())
    }

    fn read_parameters(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for node in element_children(section) {
            let parameter = Parameter::new(
                self.attr(&node, "name")?,
                self.attr_f32(&node, "minimum")?,
                self.attr_f32(&node, "maximum")?,
                self.attr_f32(&node, "default")?,
            );
            self.model.add_parameter(parameter)?;
        }
        Ok(())
    }

    fn read_symbols(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for node in element_children(section) {
            let symbol = Symbol::new(
                self.attr(&node, "name")?,
                self.attr_f32(&node, "minimum")?,
                self.attr_f32(&node, "maximum")?,
                self.attr_f32(&node, "default")?,
            );
            self.model.add_symbol(symbol)?;
        }
        if self.model.symbols().len() < posture_symbol::COUNT {
            return Err(self.error(format!(
                "model declares {} symbols, at least {} are required",
                self.model.symbols().len(),
                posture_symbol::COUNT
            )));
        }
        Ok(())
    }

    fn read_postures(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for node in element_children(section) {
            let name = self.attr(&node, "symbol")?;
            let id = self.model.add_posture(name)?;
            let comment = self.comment_child(&node);
            self.model.posture_mut(id)?.set_comment(comment);

            for child in element_children(&node) {
                match child.tag_name().name() {
                    "posture-categories" => {
                        for category_ref in element_children(&child) {
                            let category_name = self.attr(&category_ref, "name")?;
                            let category =
                                self.model.find_category(category_name).ok_or_else(|| {
                                    ModelError::lookup(EntityKind::Category, category_name)
                                })?;
                            self.model.posture_mut(id)?.add_category(category);
                        }
                    }
                    "parameter-targets" => {
                        for target in element_children(&child) {
                            let parameter_name = self.attr(&target, "name")?;
                            let index =
                                self.model.find_parameter(parameter_name).ok_or_else(|| {
                                    ModelError::lookup(EntityKind::Parameter, parameter_name)
                                })?;
                            let value = self.attr_f32(&target, "value")?;
                            self.model.posture_mut(id)?.set_parameter_target(index, value)?;
                        }
                    }
                    "symbol-targets" => {
                        for target in element_children(&child) {
                            let symbol_name = self.attr(&target, "name")?;
                            let index = self.model.find_symbol(symbol_name).ok_or_else(|| {
                                ModelError::lookup(EntityKind::Symbol, symbol_name)
                            })?;
                            let value = self.attr_f32(&target, "value")?;
                            self.model.posture_mut(id)?.set_symbol_target(index, value)?;
                        }
                    }
                    "comment" => {}
                    other => {
                        return Err(self.error(format!("unexpected posture child: {other}")));
                    }
                }
            }
        }
        Ok(())
    }

    fn read_equation_groups(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for group_node in element_children(section) {
            let group_name = self.attr(&group_node, "name")?.to_string();
            let group = self.model.add_equation_group(group_name);
            for node in element_children(&group_node) {
                let mut equation =
                    Equation::new(self.attr(&node, "name")?, self.attr(&node, "formula")?)?;
                equation.set_comment(self.comment_child(&node));
                self.model.add_equation(group, equation)?;
            }
        }
        Ok(())
    }

    fn read_point(&self, node: &Node<'_, '_>) -> ModelResult<TransitionPoint> {
        let transition_type = {
            let raw = self.attr(node, "type")?;
            TransitionType::from_name(raw)
                .ok_or_else(|| self.error(format!("invalid point type: {raw}")))?
        };
        let value = self.attr_f32(node, "value")?;
        let time = if let Some(equation_name) = node.attribute("time-expression") {
            let id = self
                .model
                .find_equation(equation_name)
                .ok_or_else(|| ModelError::lookup(EntityKind::Equation, equation_name))?;
            PointTime::Expression(id)
        } else {
            PointTime::Free(self.attr_f32(node, "free-time")?)
        };
        Ok(TransitionPoint {
            transition_type,
            value,
            time,
            is_phantom: node.attribute("is-phantom") == Some("yes"),
        })
    }

    fn read_transition_groups(&mut self, section: &Node<'_, '_>, special: bool) -> ModelResult<()> {
        for group_node in element_children(section) {
            let group_name = self.attr(&group_node, "name")?.to_string();
            let group = if special {
                self.model.add_special_transition_group(&group_name)
            } else {
                self.model.add_transition_group(&group_name)
            };
            for node in element_children(&group_node) {
                let transition_type = {
                    let raw = self.attr(&node, "type")?;
                    TransitionType::from_name(raw)
                        .ok_or_else(|| self.error(format!("invalid transition type: {raw}")))?
                };
                let mut transition =
                    Transition::new(self.attr(&node, "name")?, transition_type, special);
                transition.set_comment(self.comment_child(&node));

                let items = element_children(&node)
                    .find(|n| n.tag_name().name() == "point-or-slopes");
                if let Some(items) = items {
                    for item in element_children(&items) {
                        match item.tag_name().name() {
                            "point" => transition.push(PointOrSlope::Point(self.read_point(&item)?)),
                            "slope-ratio" => {
                                let mut points = Vec::new();
                                let mut slopes = Vec::new();
                                for part in element_children(&item) {
                                    match part.tag_name().name() {
                                        "points" => {
                                            for point in element_children(&part) {
                                                points.push(self.read_point(&point)?);
                                            }
                                        }
                                        "slopes" => {
                                            for slope in element_children(&part) {
                                                slopes.push(self.attr_f32(&slope, "slope")?);
                                            }
                                        }
                                        other => {
                                            return Err(self.error(format!(
                                                "unexpected slope-ratio child: {other}"
                                            )));
                                        }
                                    }
                                }
                                transition
                                    .push(PointOrSlope::SlopeRatio(SlopeRatio { points, slopes }));
                            }
                            other => {
                                return Err(
                                    self.error(format!("unexpected transition child: {other}"))
                                );
                            }
                        }
                    }
                }

                if special {
                    self.model.add_special_transition(group, transition)?;
                } else {
                    self.model.add_transition(group, transition)?;
                }
            }
        }
        Ok(())
    }

    fn read_rules(&mut self, section: &Node<'_, '_>) -> ModelResult<()> {
        for (rule_index, node) in element_children(section).enumerate() {
            let rule = self
                .read_rule(&node)
                .map_err(|e| ModelError::invalid_model(rule_index + 1, e.to_string()))?;
            self.model.add_rule(rule);
        }
        Ok(())
    }

    fn read_rule(&self, node: &Node<'_, '_>) -> ModelResult<Rule> {
        let mut expressions = Vec::new();
        let mut param_profiles: Vec<Option<TransitionId>> =
            vec![None; self.model.parameters().len()];
        let mut special_profiles: Vec<Option<TransitionId>> =
            vec![None; self.model.parameters().len()];
        let mut symbol_equations = crate::rule::ExpressionSymbolEquations::default();

        for child in element_children(node) {
            match child.tag_name().name() {
                "boolean-expressions" => {
                    for expression in element_children(&child) {
                        let text = expression
                            .text()
                            .map(str::trim)
                            .unwrap_or_default()
                            .to_string();
                        expressions.push(text);
                    }
                }
                "parameter-profiles" => {
                    self.read_profiles(&child, false, &mut param_profiles)?;
                }
                "special-profiles" => {
                    self.read_profiles(&child, true, &mut special_profiles)?;
                }
                "expression-symbols" => {
                    for symbol_equation in element_children(&child) {
                        let symbol_name = self.attr(&symbol_equation, "name")?;
                        let equation_name = self.attr(&symbol_equation, "equation")?;
                        let id = self
                            .model
                            .find_equation(equation_name)
                            .ok_or_else(|| ModelError::lookup(EntityKind::Equation, equation_name))?;
                        match symbol_name {
                            "rd" => symbol_equations.duration = Some(id),
                            "beat" => symbol_equations.beat = Some(id),
                            "mark1" => symbol_equations.mark1 = Some(id),
                            "mark2" => symbol_equations.mark2 = Some(id),
                            "mark3" => symbol_equations.mark3 = Some(id),
                            other => {
                                return Err(
                                    self.error(format!("unknown expression symbol: {other}"))
                                );
                            }
                        }
                    }
                }
                "comment" => {}
                other => {
                    return Err(self.error(format!("unexpected rule child: {other}")));
                }
            }
        }

        let param_profiles: Vec<TransitionId> = param_profiles
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                id.ok_or_else(|| {
                    self.error(format!(
                        "rule is missing a parameter transition for {}",
                        self.model
                            .parameters()
                            .get(index)
                            .map(|p| p.name())
                            .unwrap_or("?")
                    ))
                })
            })
            .collect::<ModelResult<_>>()?;

        let nodes = self.model.parse_boolean_expressions(&expressions)?;
        let mut rule = Rule::new(expressions, nodes, param_profiles);
        for (index, id) in special_profiles.into_iter().enumerate() {
            if id.is_some() {
                rule.set_special_profile(index, id)?;
            }
        }
        *rule.symbol_equations_mut() = symbol_equations;
        rule.set_comment(self.comment_child(node));
        Ok(rule)
    }

    fn read_profiles(
        &self,
        section: &Node<'_, '_>,
        special: bool,
        profiles: &mut [Option<TransitionId>],
    ) -> ModelResult<()> {
        for node in element_children(section) {
            let parameter_name = self.attr(&node, "name")?;
            let index = self
                .model
                .find_parameter(parameter_name)
                .ok_or_else(|| ModelError::lookup(EntityKind::Parameter, parameter_name))?;
            let transition_name = self.attr(&node, "transition")?;
            let id = if special {
                self.model.find_special_transition(transition_name).ok_or_else(|| {
                    ModelError::lookup(EntityKind::SpecialTransition, transition_name)
                })?
            } else {
                self.model
                    .find_transition(transition_name)
                    .ok_or_else(|| ModelError::lookup(EntityKind::Transition, transition_name))?
            };
            profiles[index] = Some(id);
        }
        Ok(())
    }
}
