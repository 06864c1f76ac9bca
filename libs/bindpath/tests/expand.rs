mod test_support;

use ferrum_bindpath::Error;
use test_support::*;

#[test]
fn test_expands_placeholder() {
    let action = action_with_user("Fred");
    let out = evaluator().expand("Hello ${user.name}", &action).unwrap();
    assert_eq!(out, "Hello Fred");
}

#[test]
fn test_null_placeholder_is_blank() {
    let action = Action::default();
    let out = evaluator().expand("Hello ${user.name}", &action).unwrap();
    assert_eq!(out, "Hello ");
}

#[test]
fn test_renders_values_directly() {
    let mut action = action_with_user("Fred");
    if let Some(user) = action.user.as_mut() {
        user.age = 37;
        user.lucky_numbers = Some(vec![1, 2]);
        user.role = Some(Role::Member);
    }
    let out = evaluator()
        .expand("${user.name} is ${ user.age }: ${user.luckyNumbers} ${user.role}", &action)
        .unwrap();
    assert_eq!(out, "Fred is 37: [1, 2] Member");
}

#[test]
fn test_text_without_placeholders_is_unchanged() {
    let action = Action::default();
    let out = evaluator().expand("no ${ placeholders here", &action).unwrap();
    assert_eq!(out, "no ${ placeholders here");
}

#[test]
fn test_failure_carries_placeholder() {
    let action = action_with_user("Fred");
    let err = evaluator().expand("Hi ${user.bogus}", &action).unwrap_err();
    match err {
        Error::Expander { placeholder, source } => {
            assert_eq!(placeholder, "user.bogus");
            assert!(source.is_missing_property());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = evaluator().expand("${}", &action).unwrap_err();
    assert!(matches!(err, Error::Expander { .. }));
}
