use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct JourneyTunnelScenarioCli {
    /// Base URL of the service to test, for example `http://localhost:8080`.
    ///
    /// When set this takes precedence over the base URL in the journey configuration.
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// The number of virtual users to run
    #[clap(long)]
    pub agents: Option<usize>,

    /// Assign a behaviour to a number of virtual users. Specify the behaviour and number of virtual
    /// users to assign it to in the format `behaviour:count`. For example `--behaviour=browse:5`.
    ///
    /// Specifying the count is optional and will default to 1.
    ///
    /// You can specify multiple behaviours by using the flag multiple times. For example
    /// `--behaviour=browse:5 --behaviour=checkout:5`.
    ///
    /// The total assigned must be less than or equal to the number of virtual users. Any remaining
    /// virtual users are assigned the default behaviour.
    #[clap(long, short, value_parser = parse_agent_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The number of seconds to run the scenario for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// How many times each virtual user runs its behaviour before stopping.
    ///
    /// Defaults to a single run when neither a duration nor soak mode is configured. When combined
    /// with a duration, whichever limit is reached first ends the virtual user.
    #[clap(long)]
    pub iterations: Option<usize>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Where to send the timing of every operation and transaction.
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Identifier for this run, generated when not provided.
    #[clap(long)]
    pub run_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep everything in memory and print a summary table at the end of the run
    #[default]
    InMemory,
    /// Discard all timings
    Noop,
}

fn parse_agent_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = match parts.next() {
        Some(count) => count
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid count for behaviour [{name}]: {e}"))?,
        None => 1,
    };

    Ok((name, count))
}
