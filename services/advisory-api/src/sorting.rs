//! Sort keys accepted by the listing endpoints (`?type=`), each mapped to an
//! ORDER BY clause for Postgres and a comparator for the in-memory store.

use crate::models::{AdviserCard, Portfolio, Recommendation};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdviserSort {
    #[default]
    Composite,
    SuccessRatio,
    AccumulateProfit,
    Fans,
}

impl AdviserSort {
    /// Unknown keys fall back to the composite order.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("2") => AdviserSort::SuccessRatio,
            Some("4") => AdviserSort::AccumulateProfit,
            _ => AdviserSort::Composite,
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            AdviserSort::Composite => "u.id ASC",
            AdviserSort::SuccessRatio => "success_ratio DESC, u.id ASC",
            AdviserSort::AccumulateProfit => "accumulate_profit_ratio DESC, u.id ASC",
            AdviserSort::Fans => "fans DESC, u.id ASC",
        }
    }

    pub fn compare(&self, a: &AdviserCard, b: &AdviserCard) -> Ordering {
        let primary = match self {
            AdviserSort::Composite => Ordering::Equal,
            AdviserSort::SuccessRatio => b.success_ratio.cmp(&a.success_ratio),
            AdviserSort::AccumulateProfit => b.accumulate_profit_ratio.cmp(&a.accumulate_profit_ratio),
            AdviserSort::Fans => b.fans.cmp(&a.fans),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortfolioSort {
    #[default]
    Newest,
    Day,
    Week,
    Month,
    Accumulate,
}

impl PortfolioSort {
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("1") => PortfolioSort::Day,
            Some("2") => PortfolioSort::Week,
            Some("3") => PortfolioSort::Month,
            Some("4") => PortfolioSort::Accumulate,
            _ => PortfolioSort::Newest,
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            PortfolioSort::Newest => "ctime DESC, id DESC",
            PortfolioSort::Day => "curdate_ratio DESC, id DESC",
            PortfolioSort::Week => "week_ratio DESC, id DESC",
            PortfolioSort::Month => "month_ratio DESC, id DESC",
            PortfolioSort::Accumulate => "accumulate_ratio DESC, id DESC",
        }
    }

    pub fn compare(&self, a: &Portfolio, b: &Portfolio) -> Ordering {
        let primary = match self {
            PortfolioSort::Newest => b.ctime.cmp(&a.ctime),
            PortfolioSort::Day => b.curdate_ratio.cmp(&a.curdate_ratio),
            PortfolioSort::Week => b.week_ratio.cmp(&a.week_ratio),
            PortfolioSort::Month => b.month_ratio.cmp(&a.month_ratio),
            PortfolioSort::Accumulate => b.accumulate_ratio.cmp(&a.accumulate_ratio),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecommendationOrder {
    #[default]
    Newest,
    Trending,
}

impl RecommendationOrder {
    pub fn order_by(&self) -> &'static str {
        match self {
            RecommendationOrder::Newest => "ctime DESC, id DESC",
            RecommendationOrder::Trending => "accumulate_ratio DESC, id DESC",
        }
    }

    pub fn compare(&self, a: &Recommendation, b: &Recommendation) -> Ordering {
        let primary = match self {
            RecommendationOrder::Newest => b.ctime.cmp(&a.ctime),
            RecommendationOrder::Trending => b.accumulate_ratio.cmp(&a.accumulate_ratio),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

/// Stable partition: members keep their relative order and come first.
pub fn members_first<T, F>(items: Vec<T>, is_member: F) -> Vec<T>
where
    F: Fn(&T) -> bool,
{
    let (mut members, rest): (Vec<T>, Vec<T>) = items.into_iter().partition(|item| is_member(item));
    members.extend(rest);
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card(id: i64, success: rust_decimal::Decimal, fans: i64) -> AdviserCard {
        AdviserCard {
            id,
            title: None,
            title_certificate: String::new(),
            avatar: None,
            name: format!("adviser{}", id),
            success_ratio: success,
            accumulate_profit_ratio: dec!(0),
            fans,
        }
    }

    #[test]
    fn test_adviser_param_mapping() {
        assert_eq!(AdviserSort::from_param(Some("2")), AdviserSort::SuccessRatio);
        assert_eq!(AdviserSort::from_param(Some("4")), AdviserSort::AccumulateProfit);
        assert_eq!(AdviserSort::from_param(Some("1")), AdviserSort::Composite);
        assert_eq!(AdviserSort::from_param(Some("abc")), AdviserSort::Composite);
        assert_eq!(AdviserSort::from_param(None), AdviserSort::Composite);
    }

    #[test]
    fn test_success_ratio_sorts_descending() {
        let mut cards = vec![card(1, dec!(0.2), 0), card(2, dec!(0.9), 0), card(3, dec!(0.2), 0)];
        cards.sort_by(|a, b| AdviserSort::SuccessRatio.compare(a, b));
        let ids: Vec<i64> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_fans_sort() {
        let mut cards = vec![card(1, dec!(0), 1), card(2, dec!(0), 5), card(3, dec!(0), 3)];
        cards.sort_by(|a, b| AdviserSort::Fans.compare(a, b));
        assert_eq!(cards[0].id, 2);
        assert_eq!(cards[2].id, 1);
    }

    #[test]
    fn test_portfolio_param_mapping() {
        assert_eq!(PortfolioSort::from_param(Some("3")), PortfolioSort::Month);
        assert_eq!(PortfolioSort::from_param(None), PortfolioSort::Newest);
        assert!(PortfolioSort::Accumulate.order_by().starts_with("accumulate_ratio DESC"));
    }

    #[test]
    fn test_members_first_is_stable() {
        let ordered = members_first(vec![1, 2, 3, 4, 5, 6], |n| n % 3 == 0);
        assert_eq!(ordered, vec![3, 6, 1, 2, 4, 5]);
    }
}
