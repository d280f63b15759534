//! Command implementations.

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use artic_control::{write_frames, Controller};

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("could not read {path}"))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("could not read stdin")?;
            Ok(text)
        }
    }
}

fn write_output(frames: &[Vec<f32>], output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            let mut file =
                std::fs::File::create(path).with_context(|| format!("could not create {path}"))?;
            write_frames(frames, &mut file)?;
        }
        None => {
            let stdout = std::io::stdout();
            write_frames(frames, &mut stdout.lock())?;
        }
    }
    Ok(())
}

pub fn synth(
    voice: &str,
    text: Option<&str>,
    output: Option<&str>,
    seed: u32,
    tempo: Option<f64>,
) -> Result<ExitCode> {
    let mut controller =
        Controller::from_voice_pack(voice).with_context(|| format!("could not load voice {voice}"))?;
    if let Some(tempo) = tempo {
        controller.config_mut().global_tempo = tempo;
    }

    let text = match text {
        Some(text) => text.to_string(),
        None => read_input(None)?,
    };
    let frames = controller
        .synthesize_phonetic_string(text.trim(), seed)
        .context("synthesis failed")?;
    write_output(&frames, output)?;
    Ok(ExitCode::SUCCESS)
}

pub fn pho1(voice: &str, input: Option<&str>, output: Option<&str>) -> Result<ExitCode> {
    let controller =
        Controller::from_voice_pack(voice).with_context(|| format!("could not load voice {voice}"))?;
    let text = read_input(input)?;
    let frames = controller
        .synthesize_pho1(&text)
        .context("pho1 synthesis failed")?;
    write_output(&frames, output)?;
    Ok(ExitCode::SUCCESS)
}

pub fn validate(voice: &str) -> Result<ExitCode> {
    let controller =
        Controller::from_voice_pack(voice).with_context(|| format!("could not load voice {voice}"))?;
    let model = controller.model();
    println!(
        "{}: {} categories, {} parameters, {} postures, {} rules",
        voice,
        model.categories().iter().filter(|c| !c.is_native()).count(),
        model.parameters().len(),
        model.postures().len(),
        model.rules().len()
    );
    Ok(ExitCode::SUCCESS)
}
