//! Human-readable formatting helpers

use std::time::Duration;

/// Format an elapsed duration: `850ms`, `2.41s`, `3m 12.5s`
pub fn duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    let secs = elapsed.as_secs_f64();

    if ms < 1000 {
        format!("{}ms", ms)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        format!("{}m {:.1}s", mins, secs % 60.0)
    }
}

/// Join names as `a, b and c`
pub fn list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}
