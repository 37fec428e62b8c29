use crate::config::DEFAULT_LOG_FILTER;
use log::debug;
use std::io::Write;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// Installs the process-wide logger with timestamped lines.
/// `RUST_LOG` overrides the build-dependent default filter.
pub fn init() {
    let result = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "RUST: [{}] [{:<5}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    })
    .try_init();

    if result.is_err() {
        debug!("Logger already initialized");
    }
}

/// Prints an ICE candidate as it is trickled
pub fn dump_candidate(label: &str, init: &RTCIceCandidateInit) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
        init.candidate, init.sdp_mid, init.sdp_mline_index, init.username_fragment
    );
}
