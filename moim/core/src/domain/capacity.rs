// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Capacity guard
//!
//! Pure checks over an approved-member count that the caller has just read
//! through the store, inside the group lock. Keeping them free of I/O lets the
//! aggregate and the lifecycle service share one definition of "full".

/// True if one more member can be approved
pub fn can_admit_one(approved: u64, max_recruit_count: u32) -> bool {
    approved < u64::from(max_recruit_count)
}

/// True if capacity may be set to `new_max` without evicting anyone
pub fn can_lower_capacity_to(approved: u64, new_max: u32) -> bool {
    u64::from(new_max) >= approved
}

pub fn is_full(approved: u64, max_recruit_count: u32) -> bool {
    approved >= u64::from(max_recruit_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_until_full() {
        assert!(can_admit_one(0, 1));
        assert!(!can_admit_one(1, 1));
        assert!(can_admit_one(9, 10));
        assert!(!can_admit_one(11, 10));
    }

    #[test]
    fn test_lower_capacity() {
        assert!(can_lower_capacity_to(3, 3));
        assert!(can_lower_capacity_to(3, 8));
        assert!(!can_lower_capacity_to(3, 2));
    }

    #[test]
    fn test_is_full_is_complement_of_admit() {
        for approved in 0..5 {
            assert_eq!(is_full(approved, 3), !can_admit_one(approved, 3));
        }
    }
}
