use log::debug;
use std::thread;
use std::time::Duration;

/// Pause after one search result's page(s) have been visited.
pub fn page_delay(delay: Duration) {
    pause(delay, "Page Delay");
}

/// Pause once a keyword's whole search is done.
pub fn search_delay(delay: Duration) {
    pause(delay, "Search Delay");
}

fn pause(delay: Duration, label: &str) {
    if delay.is_zero() {
        return;
    }
    debug!("Waiting for {} ms ({})...", delay.as_millis(), label);
    thread::sleep(delay);
}
