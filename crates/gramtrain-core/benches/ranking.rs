use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gramtrain_core::leaderboard::{rank_leaderboard, LeaderboardRange, MemberProgress};
use gramtrain_core::model::DailyScore;

fn make_members(count: usize, days: u64) -> Vec<MemberProgress> {
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    (0..count)
        .map(|m| MemberProgress {
            display_name: format!("learner-{m:03}"),
            daily_scores: (0..days)
                .filter(|d| (d + m as u64) % 5 != 0)
                .map(|d| DailyScore {
                    date: today.checked_sub_days(Days::new(d)).unwrap(),
                    points: ((m as u64 * 7 + d) % 61) as u32,
                    answers_count: 30,
                })
                .collect(),
            mastered: m % 40,
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let members = make_members(200, 120);

    let mut group = c.benchmark_group("rank_leaderboard");
    for range in [LeaderboardRange::Today, LeaderboardRange::Week, LeaderboardRange::All] {
        group.bench_function(format!("200_members_{range}"), |b| {
            b.iter(|| rank_leaderboard(black_box(&members), range, today))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
