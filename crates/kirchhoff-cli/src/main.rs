//! Demo binary: runs the simulator's canonical scenarios and reports
//! pass/fail against each one's closed-form expectation.

mod scenarios;

use anyhow::Result;
use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Scenario {
    WirePassthrough,
    RcLowpass,
    OpenCircuitSine,
    VoltageFollower,
    HalfWaveRectifier,
    Determinism,
}

/// Run Kirchhoff's built-in circuit scenarios.
#[derive(Parser, Debug)]
#[command(name = "kirchhoff", about = "Time-domain circuit simulator demo")]
struct Cli {
    /// Run a single scenario instead of the full suite.
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let selected: &[Scenario] = match cli.scenario {
        Some(s) => &[s],
        None => &[
            Scenario::WirePassthrough,
            Scenario::RcLowpass,
            Scenario::OpenCircuitSine,
            Scenario::VoltageFollower,
            Scenario::HalfWaveRectifier,
            Scenario::Determinism,
        ],
    };

    let mut failures = 0;
    for scenario in selected {
        let result = match scenario {
            Scenario::WirePassthrough => scenarios::wire_passthrough(),
            Scenario::RcLowpass => scenarios::rc_lowpass(),
            Scenario::OpenCircuitSine => scenarios::open_circuit_sine(),
            Scenario::VoltageFollower => scenarios::voltage_follower(),
            Scenario::HalfWaveRectifier => scenarios::half_wave_rectifier(),
            Scenario::Determinism => scenarios::determinism(),
        };
        if result.is_err() {
            failures += 1;
        }
    }

    println!();
    if failures == 0 {
        println!("all scenarios passed");
        Ok(())
    } else {
        anyhow::bail!("{failures} scenario(s) failed");
    }
}
