//! XML model file writer.
//!
//! Writes the same schema the reader consumes; loading a saved file yields
//! an equivalent model with entity order preserved.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::ModelResult;
use crate::model::Model;
use crate::rule::Rule;
use crate::transition::{PointOrSlope, PointTime, Transition, TransitionGroup, TransitionPoint};

/// Saves a model to an XML file.
pub fn save_model_xml(model: &Model, path: impl AsRef<Path>) -> ModelResult<()> {
    let text = model_to_xml(model)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Serializes a model to XML text.
pub fn model_to_xml(model: &Model) -> ModelResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("artic-model")))?;

    write_categories(&mut writer, model)?;
    write_parameters(&mut writer, model)?;
    write_symbols(&mut writer, model)?;
    write_postures(&mut writer, model)?;
    write_equations(&mut writer, model)?;
    write_transition_section(&mut writer, model, "transitions", model.transition_groups(), false)?;
    write_transition_section(
        &mut writer,
        model,
        "special-transitions",
        model.special_transition_groups(),
        true,
    )?;
    write_rules(&mut writer, model)?;

    writer.write_event(Event::End(BytesEnd::new("artic-model")))?;
    let bytes = writer.into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

type XmlWriter = Writer<Vec<u8>>;

fn write_comment(writer: &mut XmlWriter, comment: Option<&str>) -> ModelResult<()> {
    if let Some(comment) = comment {
        writer.write_event(Event::Start(BytesStart::new("comment")))?;
        writer.write_event(Event::Text(BytesText::new(comment)))?;
        writer.write_event(Event::End(BytesEnd::new("comment")))?;
    }
    Ok(())
}

fn write_categories(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("categories")))?;
    for category in model.categories().iter().filter(|c| !c.is_native()) {
        let mut element = BytesStart::new("category");
        element.push_attribute(("name", category.name()));
        if category.comment().is_some() {
            writer.write_event(Event::Start(element))?;
            write_comment(writer, category.comment())?;
            writer.write_event(Event::End(BytesEnd::new("category")))?;
        } else {
            writer.write_event(Event::Empty(element))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("categories")))?;
    Ok(())
}

fn write_value_triplet(
    writer: &mut XmlWriter,
    element_name: &str,
    name: &str,
    minimum: f32,
    maximum: f32,
    default: f32,
) -> ModelResult<()> {
    let mut element = BytesStart::new(element_name);
    element.push_attribute(("name", name));
    element.push_attribute(("minimum", minimum.to_string().as_str()));
    element.push_attribute(("maximum", maximum.to_string().as_str()));
    element.push_attribute(("default", default.to_string().as_str()));
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_parameters(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("parameters")))?;
    for parameter in model.parameters() {
        write_value_triplet(
            writer,
            "parameter",
            parameter.name(),
            parameter.minimum(),
            parameter.maximum(),
            parameter.default_value(),
        )?;
    }
    writer.write_event(Event::End(BytesEnd::new("parameters")))?;
    Ok(())
}

fn write_symbols(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("symbols")))?;
    for symbol in model.symbols() {
        write_value_triplet(
            writer,
            "symbol",
            symbol.name(),
            symbol.minimum(),
            symbol.maximum(),
            symbol.default_value(),
        )?;
    }
    writer.write_event(Event::End(BytesEnd::new("symbols")))?;
    Ok(())
}

fn write_postures(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("postures")))?;
    for posture in model.postures() {
        let mut element = BytesStart::new("posture");
        element.push_attribute(("symbol", posture.name()));
        writer.write_event(Event::Start(element))?;
        write_comment(writer, posture.comment())?;

        writer.write_event(Event::Start(BytesStart::new("posture-categories")))?;
        // The native category is implicit; only declared memberships are
        // written.
        for &category_id in &posture.categories()[1..] {
            let category = model.category(category_id)?;
            let mut category_ref = BytesStart::new("category-ref");
            category_ref.push_attribute(("name", category.name()));
            writer.write_event(Event::Empty(category_ref))?;
        }
        writer.write_event(Event::End(BytesEnd::new("posture-categories")))?;

        writer.write_event(Event::Start(BytesStart::new("parameter-targets")))?;
        for (index, parameter) in model.parameters().iter().enumerate() {
            let mut target = BytesStart::new("target");
            target.push_attribute(("name", parameter.name()));
            target.push_attribute(("value", posture.parameter_target(index)?.to_string().as_str()));
            writer.write_event(Event::Empty(target))?;
        }
        writer.write_event(Event::End(BytesEnd::new("parameter-targets")))?;

        writer.write_event(Event::Start(BytesStart::new("symbol-targets")))?;
        for (index, symbol) in model.symbols().iter().enumerate() {
            let mut target = BytesStart::new("target");
            target.push_attribute(("name", symbol.name()));
            target.push_attribute(("value", posture.symbol_target(index)?.to_string().as_str()));
            writer.write_event(Event::Empty(target))?;
        }
        writer.write_event(Event::End(BytesEnd::new("symbol-targets")))?;

        writer.write_event(Event::End(BytesEnd::new("posture")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("postures")))?;
    Ok(())
}

fn write_equations(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("equations")))?;
    for group in model.equation_groups() {
        let mut group_element = BytesStart::new("equation-group");
        group_element.push_attribute(("name", group.name.as_str()));
        writer.write_event(Event::Start(group_element))?;
        for &id in &group.equations {
            let equation = model.equation(id)?;
            let mut element = BytesStart::new("equation");
            element.push_attribute(("name", equation.name()));
            element.push_attribute(("formula", equation.formula()));
            if equation.comment().is_some() {
                writer.write_event(Event::Start(element))?;
                write_comment(writer, equation.comment())?;
                writer.write_event(Event::End(BytesEnd::new("equation")))?;
            } else {
                writer.write_event(Event::Empty(element))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("equation-group")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("equations")))?;
    Ok(())
}

fn point_element(model: &Model, point: &TransitionPoint) -> ModelResult<BytesStart<'static>> {
    let mut element = BytesStart::new("point");
    element.push_attribute(("type", point.transition_type.name()));
    element.push_attribute(("value", point.value.to_string().as_str()));
    match point.time {
        PointTime::Free(time) => {
            element.push_attribute(("free-time", time.to_string().as_str()));
        }
        PointTime::Expression(id) => {
            element.push_attribute(("time-expression", model.equation(id)?.name()));
        }
    }
    if point.is_phantom {
        element.push_attribute(("is-phantom", "yes"));
    }
    Ok(element)
}

fn write_transition(writer: &mut XmlWriter, model: &Model, transition: &Transition) -> ModelResult<()> {
    let mut element = BytesStart::new("transition");
    element.push_attribute(("name", transition.name()));
    element.push_attribute(("type", transition.transition_type().name()));
    writer.write_event(Event::Start(element))?;
    write_comment(writer, transition.comment())?;

    writer.write_event(Event::Start(BytesStart::new("point-or-slopes")))?;
    for item in transition.items() {
        match item {
            PointOrSlope::Point(point) => {
                writer.write_event(Event::Empty(point_element(model, point)?))?;
            }
            PointOrSlope::SlopeRatio(slope_ratio) => {
                writer.write_event(Event::Start(BytesStart::new("slope-ratio")))?;
                writer.write_event(Event::Start(BytesStart::new("points")))?;
                for point in &slope_ratio.points {
                    writer.write_event(Event::Empty(point_element(model, point)?))?;
                }
                writer.write_event(Event::End(BytesEnd::new("points")))?;
                writer.write_event(Event::Start(BytesStart::new("slopes")))?;
                for slope in &slope_ratio.slopes {
                    let mut slope_element = BytesStart::new("slope");
                    slope_element.push_attribute(("slope", slope.to_string().as_str()));
                    writer.write_event(Event::Empty(slope_element))?;
                }
                writer.write_event(Event::End(BytesEnd::new("slopes")))?;
                writer.write_event(Event::End(BytesEnd::new("slope-ratio")))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new("point-or-slopes")))?;

    writer.write_event(Event::End(BytesEnd::new("transition")))?;
    Ok(())
}

fn write_transition_section(
    writer: &mut XmlWriter,
    model: &Model,
    section_name: &str,
    groups: &[TransitionGroup],
    special: bool,
) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new(section_name)))?;
    for group in groups {
        let mut group_element = BytesStart::new("transition-group");
        group_element.push_attribute(("name", group.name.as_str()));
        writer.write_event(Event::Start(group_element))?;
        for &id in &group.transitions {
            let transition = if special {
                model.special_transition(id)?
            } else {
                model.transition(id)?
            };
            write_transition(writer, model, transition)?;
        }
        writer.write_event(Event::End(BytesEnd::new("transition-group")))?;
    }
    writer.write_event(Event::End(BytesEnd::new(section_name)))?;
    Ok(())
}

fn write_rule(writer: &mut XmlWriter, model: &Model, rule: &Rule) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("rule")))?;

    writer.write_event(Event::Start(BytesStart::new("boolean-expressions")))?;
    for expression in rule.boolean_expressions() {
        writer.write_event(Event::Start(BytesStart::new("boolean-expression")))?;
        writer.write_event(Event::Text(BytesText::new(expression)))?;
        writer.write_event(Event::End(BytesEnd::new("boolean-expression")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("boolean-expressions")))?;

    writer.write_event(Event::Start(BytesStart::new("parameter-profiles")))?;
    for (index, parameter) in model.parameters().iter().enumerate() {
        let transition = model.transition(rule.param_profile(index)?)?;
        let mut element = BytesStart::new("parameter-transition");
        element.push_attribute(("name", parameter.name()));
        element.push_attribute(("transition", transition.name()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("parameter-profiles")))?;

    let has_special = (0..model.parameters().len())
        .any(|index| matches!(rule.special_profile(index), Ok(Some(_))));
    if has_special {
        writer.write_event(Event::Start(BytesStart::new("special-profiles")))?;
        for (index, parameter) in model.parameters().iter().enumerate() {
            if let Some(id) = rule.special_profile(index)? {
                let transition = model.special_transition(id)?;
                let mut element = BytesStart::new("parameter-transition");
                element.push_attribute(("name", parameter.name()));
                element.push_attribute(("transition", transition.name()));
                writer.write_event(Event::Empty(element))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("special-profiles")))?;
    }

    let equations = rule.symbol_equations();
    let named = [
        ("rd", equations.duration),
        ("beat", equations.beat),
        ("mark1", equations.mark1),
        ("mark2", equations.mark2),
        ("mark3", equations.mark3),
    ];
    if named.iter().any(|(_, id)| id.is_some()) {
        writer.write_event(Event::Start(BytesStart::new("expression-symbols")))?;
        for (name, id) in named {
            if let Some(id) = id {
                let mut element = BytesStart::new("symbol-equation");
                element.push_attribute(("name", name));
                element.push_attribute(("equation", model.equation(id)?.name()));
                writer.write_event(Event::Empty(element))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("expression-symbols")))?;
    }

    write_comment(writer, rule.comment())?;
    writer.write_event(Event::End(BytesEnd::new("rule")))?;
    Ok(())
}

fn write_rules(writer: &mut XmlWriter, model: &Model) -> ModelResult<()> {
    writer.write_event(Event::Start(BytesStart::new("rules")))?;
    for rule in model.rules() {
        write_rule(writer, model, rule)?;
    }
    writer.write_event(Event::End(BytesEnd::new("rules")))?;
    Ok(())
}
