//! Distribution checks for the outcome generators over seeded draws

use rand::rngs::StdRng;
use rand::SeedableRng;
use roundhouse::config::CrashConfig;
use roundhouse::games::cases::starter_case;
use roundhouse::games::mines::survival_probability;
use roundhouse::games::roulette::{pocket_color, PocketColor};
use roundhouse::games::upgrader::{upgrade, upgrade_chance};
use roundhouse::games::{
    BetArea, CrashCurve, Difficulty, Inventory, MultiplierTable, PumpTable, RiskLevel, RouletteLayout, SegmentCount,
    Wheel,
};
use roundhouse::Money;

const DRAWS: usize = 100_000;

#[test]
fn test_case_draws_follow_odds() {
    let case = starter_case().unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut counts = vec![0usize; case.items().len()];
    for _ in 0..DRAWS {
        counts[case.pick_winner(&mut rng)] += 1;
    }

    let chi_square: f64 = case
        .items()
        .iter()
        .zip(&counts)
        .map(|(item, &observed)| {
            let expected = DRAWS as f64 * item.odds / 100.0;
            (observed as f64 - expected).powi(2) / expected
        })
        .sum();

    // 6 degrees of freedom, p = 0.001
    assert!(chi_square < 22.46, "chi-square {}", chi_square);
}

#[test]
fn test_every_wheel_returns_099() {
    for risk in RiskLevel::ALL {
        for segments in SegmentCount::ALL {
            let wheel = Wheel::new(risk, segments);
            assert_eq!(wheel.multipliers().len() as u32, segments.get());
            assert!(
                (wheel.expected_return() - 0.99).abs() < 1e-9,
                "{} / {} returns {}",
                risk,
                segments,
                wheel.expected_return()
            );
        }
    }
    assert_eq!(Wheel::new(RiskLevel::Medium, SegmentCount::Ten).multiplier(3).unwrap(), 1.5);
}

#[test]
fn test_wheel_segments_are_uniform() {
    let wheel = Wheel::new(RiskLevel::High, SegmentCount::Ten);
    let mut rng = StdRng::seed_from_u64(9);
    let hits = (0..DRAWS).filter(|_| wheel.spin(&mut rng) == 9).count();
    let frequency = hits as f64 / DRAWS as f64;
    assert!((frequency - 0.1).abs() < 0.005, "top segment hit {}", frequency);
}

#[test]
fn test_mines_multiplier_times_survival_is_rtp() {
    for mines in 1..25 {
        let table = MultiplierTable::new(25, mines, 0.99).unwrap();
        for picks in 0..=table.max_picks() {
            let m = table.multiplier(picks).unwrap();
            let survival = survival_probability(25, mines, picks);
            assert!(
                (m * survival - 0.99).abs() < 1e-9,
                "{} mines, {} picks: {}",
                mines,
                picks,
                m * survival
            );
        }
        assert!(table.multiplier(table.max_picks() + 1).is_none());
    }
}

#[test]
fn test_crash_point_bounds() {
    let curve = CrashCurve::from_config(&CrashConfig::default()).unwrap();
    assert_eq!(curve.crash_point_for(1e-12).unwrap().value(), curve.cap());
    assert_eq!(curve.crash_point_for(0.99).unwrap().value(), 1.0);
    assert_eq!(curve.crash_point_for(1.0).unwrap().value(), 1.0);
    assert_eq!(curve.crash_point_for(0.5).unwrap().value(), 1.98);
    assert!(curve.crash_point_for(0.0).is_err());
    assert!(curve.crash_point_for(1.5).is_err());
}

#[test]
fn test_crash_survival_matches_draws() {
    let curve = CrashCurve::from_config(&CrashConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(77);

    let mut at_least_two = 0usize;
    let mut instant = 0usize;
    for _ in 0..DRAWS {
        let point = curve.draw(&mut rng).unwrap().value();
        assert!(point >= 1.0 && point <= curve.cap());
        if point >= 2.0 {
            at_least_two += 1;
        }
        if point == 1.0 {
            instant += 1;
        }
    }

    let p2 = at_least_two as f64 / DRAWS as f64;
    assert!((p2 - curve.survival(2.0)).abs() < 0.01, "P(C >= 2) = {}", p2);
    // r in [0.99, 1] truncates to 1.00, as does anything under 1.01
    let p1 = instant as f64 / DRAWS as f64;
    assert!((p1 - (1.0 - 0.99 / 1.01)).abs() < 0.005, "P(C = 1) = {}", p1);
}

#[test]
fn test_pump_first_step_pop_rate() {
    let table = PumpTable::new(Difficulty::Hard).unwrap();
    let expected = table.step(0).unwrap().pop_chance();
    let mut rng = StdRng::seed_from_u64(31);

    let pops = (0..DRAWS).filter(|_| table.pops(0, &mut rng).unwrap()).count();
    let frequency = pops as f64 / DRAWS as f64;
    assert!((frequency - expected).abs() < 0.01, "popped {} vs {}", frequency, expected);
}

#[test]
fn test_pump_multipliers_rise_and_survival_falls() {
    for difficulty in Difficulty::ALL {
        let table = PumpTable::new(difficulty).unwrap();
        for pair in table.steps().windows(2) {
            assert!(pair[1].multiplier > pair[0].multiplier, "{}", difficulty);
        }
        assert!(table.pops(table.len(), &mut StdRng::seed_from_u64(0)).is_err());
    }
}

fn manual_payout(chips: &[(BetArea, i64)], winning: u8) -> i64 {
    let red = pocket_color(winning) == PocketColor::Red;
    chips
        .iter()
        .map(|&(area, cents)| {
            let n = winning;
            let (hit, times) = match area {
                BetArea::Straight(x) => (n == x, 36),
                BetArea::Split(a, b) => (n == a || n == b, 18),
                BetArea::Street(row) => (n >= 3 * row - 2 && n <= 3 * row && n != 0, 12),
                BetArea::Corner(x) => (n == x || n == x + 1 || n == x + 3 || n == x + 4, 9),
                BetArea::Line(row) => (n != 0 && n >= 3 * row - 2 && n <= 3 * row + 3, 6),
                BetArea::Dozen(d) => (n != 0 && n > 12 * (d - 1) && n <= 12 * d, 3),
                BetArea::Column(c) => (n != 0 && n % 3 == c % 3, 3),
                BetArea::Red => (red, 2),
                BetArea::Black => (n != 0 && !red, 2),
                BetArea::Even => (n != 0 && n % 2 == 0, 2),
                BetArea::Odd => (n % 2 == 1, 2),
                BetArea::Low => ((1..=18).contains(&n), 2),
                BetArea::High => ((19..=36).contains(&n), 2),
            };
            if hit {
                cents * times
            } else {
                0
            }
        })
        .sum()
}

#[test]
fn test_roulette_payout_matches_hand_sum_for_every_pocket() {
    let chips = [
        (BetArea::Straight(0), 25),
        (BetArea::Straight(17), 10),
        (BetArea::Split(17, 20), 10),
        (BetArea::Street(4), 15),
        (BetArea::Corner(26), 20),
        (BetArea::Line(7), 30),
        (BetArea::Dozen(3), 40),
        (BetArea::Column(1), 35),
        (BetArea::Red, 100),
        (BetArea::Even, 50),
        (BetArea::High, 75),
    ];
    let mut layout = RouletteLayout::new();
    for (area, cents) in chips {
        layout.add_chip(area, Money::from_cents(cents)).unwrap();
    }

    for winning in 0..37u8 {
        assert_eq!(
            layout.payout(winning),
            Money::from_cents(manual_payout(&chips, winning)),
            "pocket {}",
            winning
        );
    }
}

#[test]
fn test_roulette_even_money_return() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut layout = RouletteLayout::new();
    layout.add_chip(BetArea::Black, Money::from_cents(100)).unwrap();

    let mut paid = 0i64;
    for _ in 0..DRAWS {
        paid += layout.payout(roundhouse::games::roulette::spin(&mut rng)).cents();
    }
    let rtp = paid as f64 / (DRAWS as f64 * 100.0);
    assert!((rtp - 36.0 / 37.0).abs() < 0.015, "black returned {}", rtp);
}

#[test]
fn test_upgrade_wins_at_its_stated_chance() {
    let case = starter_case().unwrap();
    let staked = case.item(3).unwrap().clone();
    let target = case.item(4).unwrap().clone();
    let chance = upgrade_chance(staked.price, target.price);

    let mut rng = StdRng::seed_from_u64(12);
    let mut inventory = Inventory::new();
    let trials = 20_000;
    let mut wins = 0;
    for _ in 0..trials {
        let id = inventory.add(staked.clone());
        if upgrade(&mut inventory, &[id], &target, &mut rng).unwrap().won {
            wins += 1;
        }
    }

    let frequency = wins as f64 / trials as f64 * 100.0;
    assert!((frequency - chance).abs() < 1.5, "won {}% vs {}%", frequency, chance);
    assert_eq!(inventory.len(), wins);
}
