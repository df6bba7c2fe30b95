//! Interactive play over a line-oriented reader and writer.
//!
//! At a choice node the player answers with an option id or number, an exact
//! id taking precedence. `r`
//! restarts the scenario, `q` quits. Auto nodes and choice nodes with no
//! available option resolve without input.

use std::io::{BufRead, Write};

use scenaria_engine::random::RandomSource;
use scenaria_engine::simulation::Simulation;
use scenaria_engine::SimulationError;
use scenaria_telemetry::MetricsRecorder;
use tracing::warn;

use crate::render;

enum Command {
    Choose(String),
    Reset,
    Quit,
}

fn parse(line: &str, ids: &[String]) -> Option<Command> {
    let line = line.trim();
    match line {
        "" => None,
        "q" | "quit" => Some(Command::Quit),
        "r" | "reset" => Some(Command::Reset),
        _ if ids.iter().any(|id| id == line) => Some(Command::Choose(line.to_string())),
        _ => match line.parse::<usize>() {
            Ok(n) if (1..=ids.len()).contains(&n) => Some(Command::Choose(ids[n - 1].clone())),
            Ok(_) => None,
            Err(_) => Some(Command::Choose(line.to_string())),
        },
    }
}

pub fn play<I, O, R>(
    simulation: &mut Simulation,
    rng: &mut R,
    metrics: &MetricsRecorder,
    input: &mut I,
    out: &mut O,
) -> anyhow::Result<()>
where
    I: BufRead,
    O: Write,
    R: RandomSource + ?Sized,
{
    let title = simulation.scenario().title().to_string();
    if !title.is_empty() {
        writeln!(out, "== {title} ==")?;
    }

    while !simulation.is_terminal() {
        let Some(node) = simulation.current_node() else {
            break;
        };
        if !node.prompt.is_empty() {
            writeln!(out, "\n{}", node.prompt)?;
        }
        let (ids, labels): (Vec<String>, Vec<String>) = simulation
            .available_options()?
            .into_iter()
            .map(|option| (option.id.clone(), render::option_label(option).to_string()))
            .unzip();

        let outcome = if ids.is_empty() {
            simulation.advance(rng)
        } else {
            for (n, label) in labels.iter().enumerate() {
                writeln!(out, "  {}) {}", n + 1, label)?;
            }
            write!(out, "> ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out, "\nInput closed.")?;
                return Ok(());
            }
            match parse(&line, &ids) {
                Some(Command::Choose(id)) => simulation.choose_option(&id, rng),
                Some(Command::Reset) => {
                    simulation.reset();
                    writeln!(out, "Starting over.")?;
                    continue;
                }
                Some(Command::Quit) => return Ok(()),
                None => {
                    writeln!(out, "Pick a number between 1 and {}.", ids.len())?;
                    continue;
                }
            }
        };

        match outcome {
            Ok(step) => {
                render::record(metrics, &step);
                writeln!(out)?;
                render::resolution(out, &step)?;
                render::state(out, simulation)?;
                simulation.acknowledge()?;
            }
            Err(err @ (SimulationError::UnknownOption { .. } | SimulationError::OptionUnavailable { .. })) => {
                writeln!(out, "{err}")?;
            }
            Err(err) => {
                metrics.failed_transitions.inc();
                warn!(error = %err, "transition failed");
                return Err(err.into());
            }
        }
    }

    writeln!(out, "\nThe end.")?;
    render::state(out, simulation)?;
    Ok(())
}
