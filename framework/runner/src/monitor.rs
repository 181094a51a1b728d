use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::shutdown::DelegatedShutdownListener;

/// Share of the machine's total CPU above which the load generator itself may be skewing timings.
const HIGH_CPU_USAGE_PERCENT: f32 = 10.0;

/// Don't repeat the high usage warning more often than this.
const WARNING_INTERVAL: Duration = Duration::from_secs(10);

/// Monitor the resource usage of the load generating process and report high usage.
///
/// Note that this won't stop the test proceeding, it will just log a warning to let the user know
/// that their response times might be affected by the load generator competing for CPU.
pub(crate) fn start_monitor(mut shutdown_listener: DelegatedShutdownListener) {
    let spawned = std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);
            let mut last_warning: Option<Instant> = None;

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::warn!("Unable to read process info, stopping the resource monitor");
                    break;
                };

                let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                let warned_recently = last_warning
                    .is_some_and(|warned_at| warned_at.elapsed() < WARNING_INTERVAL);
                if usage > HIGH_CPU_USAGE_PERCENT && !warned_recently {
                    log::warn!(
                        "High CPU usage detected. The load generator is using {:.2}% of the CPU, with {} available cores",
                        usage,
                        cpu_count
                    );
                    last_warning = Some(Instant::now());
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start monitor thread, continuing without it: {e:?}");
    }
}
