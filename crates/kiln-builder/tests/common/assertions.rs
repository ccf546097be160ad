//! Command line assertions

/// Assert that `flag` is immediately followed by `value`
pub fn assert_flag_value(args: &[String], flag: &str, value: &str) {
    let found = args
        .windows(2)
        .any(|pair| pair[0] == flag && pair[1] == value);
    assert!(found, "expected `{} {}` in {:?}", flag, value, args);
}

/// Assert that `first` occurs before `second`
pub fn assert_before(args: &[String], first: &str, second: &str) {
    let a = args.iter().position(|a| a == first);
    let b = args.iter().position(|a| a == second);
    match (a, b) {
        (Some(a), Some(b)) => assert!(a < b, "expected {} before {} in {:?}", first, second, args),
        _ => panic!("expected both {} and {} in {:?}", first, second, args),
    }
}

/// Values following every occurrence of `flag`
pub fn values_of<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].as_str())
        .collect()
}
