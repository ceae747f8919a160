//! Known signals and their display names.

use crate::domain::SignalKey;

/// `(display name, source, signal)` for the signals the tool is tuned for.
pub const KNOWN_SIGNALS: [(&str, &str, &str); 7] = [
    ("Cases (7-day avg., per 100k)", "jhu-csse", "confirmed_7dav_incidence_prop"),
    ("Deaths (7-day avg., per 100k)", "jhu-csse", "deaths_7dav_incidence_prop"),
    (
        "Confirmed Covid-19 Hospitalizations (7-day avg., per 100k)",
        "hhs",
        "confirmed_admissions_covid_1d_prop_7dav",
    ),
    (
        "Confirmed + Suspected Covid-19 Hospitalizations (7-day avg., per 100k)",
        "hhs",
        "sum_confirmed_suspected_admissions_covid_1d_prop_7dav",
    ),
    (
        "Confirmed Influenza Hospitalizations (7-day avg., per 100k)",
        "hhs",
        "confirmed_admissions_influenza_1d_prop_7dav",
    ),
    (
        "Percentage of Positive PCR Tests (7-day avg.)",
        "covid-act-now",
        "pcr_specimen_positivity_rate",
    ),
    ("Total PCR Tests (7-day avg.)", "covid-act-now", "pcr_specimen_total_tests"),
];

pub fn known_signals() -> impl Iterator<Item = (&'static str, SignalKey)> {
    KNOWN_SIGNALS
        .iter()
        .map(|(name, source, signal)| (*name, SignalKey::new(*source, *signal)))
}

/// Display name for a known signal, or `source:signal` otherwise.
pub fn display_name(key: &SignalKey) -> String {
    KNOWN_SIGNALS
        .iter()
        .find(|(_, source, signal)| *source == key.source && *signal == key.signal)
        .map(|(name, _, _)| (*name).to_string())
        .unwrap_or_else(|| key.to_string())
}
