//! Analyze a synthetic two-week commute trace and print the privacy report

use chrono::{Duration, TimeZone, Utc};
use geotrace_risk::geo::offset_m;
use geotrace_risk::types::Coordinate;
use geotrace_risk::{AnalysisConfig, RawPoint, ReportEncoder, TraceAnalyzer};

const HOME: Coordinate = Coordinate {
    lat: 40.7128,
    lon: -74.0060,
};

fn main() {
    let work = offset_m(HOME, 3500.0, 1200.0);
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();

    let mut points = Vec::new();
    for day in 0..14i64 {
        let midnight = start + Duration::days(day);
        let weekday = day % 7 < 5;

        // Home from 00:00 to 07:30, then again from 19:00 to midnight
        for slot in 0..45i64 {
            let jitter = ((slot % 4) as f64 - 1.5) * 4.0;
            let home = offset_m(HOME, jitter, -jitter);
            points.push(RawPoint::new(home.lat, home.lon, midnight + Duration::minutes(slot * 10)));
        }
        for slot in 0..30i64 {
            let jitter = ((slot % 3) as f64 - 1.0) * 5.0;
            let home = offset_m(HOME, -jitter, jitter);
            points.push(RawPoint::new(
                home.lat,
                home.lon,
                midnight + Duration::hours(19) + Duration::minutes(slot * 10),
            ));
        }

        if weekday {
            // Office from 09:00 to 17:00
            for slot in 0..48i64 {
                let jitter = ((slot % 5) as f64 - 2.0) * 3.0;
                let office = offset_m(work, jitter, jitter);
                points.push(RawPoint::new(
                    office.lat,
                    office.lon,
                    midnight + Duration::hours(9) + Duration::minutes(slot * 10),
                ));
            }
        } else {
            // A different park every weekend afternoon
            let park = offset_m(HOME, -2000.0 - day as f64 * 300.0, 800.0);
            for slot in 0..12i64 {
                points.push(RawPoint::new(
                    park.lat,
                    park.lon,
                    midnight + Duration::hours(14) + Duration::minutes(slot * 10),
                ));
            }
        }
    }

    let analyzer = match TraceAnalyzer::new(AnalysisConfig::default()) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    match analyzer
        .analyze(&points)
        .and_then(|result| ReportEncoder::new().encode_to_json(&result))
    {
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
