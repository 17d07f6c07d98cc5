//! End-to-end tests against the public API.

mod backtest;
mod pipeline;
mod scenarios;
mod settlement;

use betting_edge::backtest::HistoricalRecord;
use betting_edge::strategy::EventInput;
use betting_edge::types::{Event, OddsQuote, ProbabilityEstimate, ProbabilitySource};
use chrono::{DateTime, Duration, TimeZone, Utc};

// ---- helpers ---------------------------------------------------------------

pub fn kickoff(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap() + Duration::days(day)
}

pub fn make_event(id: &str, outcomes: &[&str], day: i64) -> Event {
    Event::new(id, outcomes.iter().map(|o| o.to_string()).collect(), kickoff(day)).unwrap()
}

/// Quote captured `hours_before` kickoff of `event`.
pub fn quote(event: &Event, outcome: &str, bookmaker: &str, price: f64, hours_before: i64) -> OddsQuote {
    OddsQuote {
        event_id: event.id.clone(),
        outcome: outcome.into(),
        bookmaker: bookmaker.into(),
        price,
        captured_at: event.starts_at - Duration::hours(hours_before),
    }
}

pub fn estimate(outcome: &str, probability: f64, source: ProbabilitySource) -> ProbabilityEstimate {
    ProbabilityEstimate::new(outcome, probability, source)
}

/// Home/draw/away fixture where the model rates the home side above the
/// market, with a second bookmaker and some line movement.
pub fn value_fixture(id: &str, day: i64) -> EventInput {
    let event = make_event(id, &["home", "draw", "away"], day);
    let quotes = vec![
        quote(&event, "home", "alpha", 2.00, 24),
        quote(&event, "draw", "alpha", 3.40, 24),
        quote(&event, "away", "alpha", 3.80, 24),
        quote(&event, "home", "beta", 2.05, 6),
        quote(&event, "draw", "beta", 3.30, 6),
        quote(&event, "away", "beta", 3.70, 6),
        quote(&event, "home", "alpha", 2.15, 2),
    ];
    let estimates = vec![
        estimate("home", 0.52, ProbabilitySource::Statistical),
        estimate("draw", 0.26, ProbabilitySource::Statistical),
        estimate("away", 0.22, ProbabilitySource::Statistical),
        estimate("home", 0.48, ProbabilitySource::Market),
        estimate("draw", 0.29, ProbabilitySource::Market),
        estimate("away", 0.26, ProbabilitySource::Market),
        estimate("home", 0.55, ProbabilitySource::Model).with_weight(0.5),
    ];
    EventInput {
        event,
        quotes,
        estimates,
    }
}

pub fn resolved(input: EventInput, winner: Option<&str>) -> HistoricalRecord {
    HistoricalRecord {
        input,
        winner: winner.map(String::from),
    }
}
