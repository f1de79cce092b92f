/// Roster ordering: roll numbers are free-text but sort numerically. A roll
/// that is not a whole number keys as 0 and therefore sorts first. The sort is
/// stable, so equal keys keep the name order the rows were fetched in.
pub fn roll_sort_key(roll: &str) -> i64 {
    roll.trim().parse::<i64>().unwrap_or(0)
}

pub fn sort_by_roll<T, F>(rows: &mut [T], roll_of: F)
where
    F: Fn(&T) -> &str,
{
    rows.sort_by_key(|row| roll_sort_key(roll_of(row)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_numeric_rolls_key_to_zero() {
        assert_eq!(roll_sort_key("10"), 10);
        assert_eq!(roll_sort_key(" 7 "), 7);
        assert_eq!(roll_sort_key("1A"), 0);
        assert_eq!(roll_sort_key(""), 0);
    }

    #[test]
    fn mixed_rolls_sort_numerically_with_defaults_first() {
        let mut rolls = vec!["10", "2", "1A", "3"];
        sort_by_roll(&mut rolls, |r| r);
        assert_eq!(rolls, vec!["1A", "2", "3", "10"]);
    }

    #[test]
    fn equal_keys_keep_incoming_order() {
        let mut rolls = vec![("x", "A1"), ("y", "B2"), ("z", "A1")];
        sort_by_roll(&mut rolls, |r| r.1);
        assert_eq!(
            rolls.iter().map(|r| r.0).collect::<Vec<_>>(),
            vec!["x", "y", "z"]
        );
    }
}
