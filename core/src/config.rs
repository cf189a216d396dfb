use tickos_abi::{TIME_SLICE, TIMER_FREQ, TIMER_FREQ_MAX, TIMER_FREQ_MIN};
use tickos_lib::cmdline::{parse_bool, parse_u32, split_option, tokens};
use tickos_lib::{KlogLevel, klog_warn};

const DEFAULT_MLFQS: bool = false;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedConfig {
    /// Multi-level feedback queue scheduling instead of priority donation.
    pub mlfqs: bool,
    /// Ticks a thread runs before yielding to an equal-priority peer.
    pub time_slice: u32,
    /// Timer interrupts per second.
    pub timer_freq: u32,
    /// Log level to switch to at scheduler init; `None` keeps the current one.
    pub log_level: Option<KlogLevel>,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            mlfqs: DEFAULT_MLFQS,
            time_slice: TIME_SLICE,
            timer_freq: TIMER_FREQ,
            log_level: None,
        }
    }
}

impl SchedConfig {
    pub fn mode_name(&self) -> &'static str {
        if self.mlfqs { "mlfqs" } else { "priority" }
    }
}

/// Parse scheduler options from the kernel command line.
///
/// Recognised: `-mlfqs`, `-o mlfqs`, `sched=mlfqs|priority`,
/// `sched.mlfqs=<bool>`, `sched.slice=<ticks>`, `timer.freq=<hz>` and
/// `loglevel=error|warn|info|debug|trace`.
/// Unknown tokens belong to other subsystems and are skipped.
pub fn config_from_cmdline(cmdline: Option<&str>) -> SchedConfig {
    let mut cfg = SchedConfig::default();
    let Some(cmdline) = cmdline else {
        return cfg;
    };

    let mut it = tokens(cmdline).peekable();
    while let Some(token) = it.next() {
        match split_option(token) {
            ("-mlfqs", None) => cfg.mlfqs = true,
            ("-o", None) => {
                if it.peek() == Some(&"mlfqs") {
                    it.next();
                    cfg.mlfqs = true;
                }
            }
            ("sched", Some(value)) => {
                if value.eq_ignore_ascii_case("mlfqs") {
                    cfg.mlfqs = true;
                } else if value.eq_ignore_ascii_case("priority") {
                    cfg.mlfqs = false;
                } else {
                    klog_warn!("sched: unknown scheduler '{}', keeping {}", value, cfg.mode_name());
                }
            }
            ("sched.mlfqs", Some(value)) => {
                if let Some(enabled) = parse_bool(value) {
                    cfg.mlfqs = enabled;
                }
            }
            ("sched.slice", Some(value)) => match parse_u32(value) {
                Some(ticks) if ticks > 0 => cfg.time_slice = ticks,
                _ => klog_warn!(
                    "sched: invalid time slice '{}', using {}",
                    value,
                    cfg.time_slice
                ),
            },
            ("timer.freq", Some(value)) => match parse_u32(value) {
                Some(hz) => {
                    let clamped = hz.clamp(TIMER_FREQ_MIN, TIMER_FREQ_MAX);
                    if clamped != hz {
                        klog_warn!("timer: frequency {} Hz out of range, using {}", hz, clamped);
                    }
                    cfg.timer_freq = clamped;
                }
                None => klog_warn!(
                    "timer: invalid frequency '{}', using {}",
                    value,
                    cfg.timer_freq
                ),
            },
            ("loglevel", Some(value)) => match KlogLevel::from_name(value) {
                Some(level) => cfg.log_level = Some(level),
                None => klog_warn!("klog: unknown log level '{}', ignoring", value),
            },
            _ => {}
        }
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_cmdline() {
        let cfg = config_from_cmdline(None);
        assert_eq!(cfg, SchedConfig::default());
        assert!(!cfg.mlfqs);
        assert_eq!(cfg.time_slice, 4);
        assert_eq!(cfg.timer_freq, 100);
    }

    #[test]
    fn test_mlfqs_spellings() {
        assert!(config_from_cmdline(Some("-mlfqs")).mlfqs);
        assert!(config_from_cmdline(Some("quiet -o mlfqs")).mlfqs);
        assert!(!config_from_cmdline(Some("-o")).mlfqs);
        assert!(config_from_cmdline(Some("sched=MLFQS")).mlfqs);
        assert!(!config_from_cmdline(Some("-mlfqs sched=priority")).mlfqs);
        assert!(config_from_cmdline(Some("sched.mlfqs=on")).mlfqs);
        assert!(!config_from_cmdline(Some("sched=lottery")).mlfqs);
    }

    #[test]
    fn test_numeric_options_are_validated() {
        let cfg = config_from_cmdline(Some("sched.slice=8 timer.freq=250"));
        assert_eq!(cfg.time_slice, 8);
        assert_eq!(cfg.timer_freq, 250);

        let cfg = config_from_cmdline(Some("sched.slice=0 timer.freq=5000"));
        assert_eq!(cfg.time_slice, TIME_SLICE);
        assert_eq!(cfg.timer_freq, TIMER_FREQ_MAX);

        assert_eq!(
            config_from_cmdline(Some("timer.freq=1")).timer_freq,
            TIMER_FREQ_MIN
        );
        assert_eq!(
            config_from_cmdline(Some("timer.freq=fast")).timer_freq,
            TIMER_FREQ
        );
    }

    #[test]
    fn test_log_level_option() {
        assert_eq!(config_from_cmdline(None).log_level, None);
        assert_eq!(
            config_from_cmdline(Some("quiet loglevel=DEBUG")).log_level,
            Some(KlogLevel::Debug)
        );
        assert_eq!(
            config_from_cmdline(Some("loglevel=trace loglevel=warn")).log_level,
            Some(KlogLevel::Warn)
        );
        assert_eq!(config_from_cmdline(Some("loglevel=loud")).log_level, None);
    }
}
