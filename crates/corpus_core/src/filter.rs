/// Joins pre-composed filter clauses into one filter expression.
///
/// An explicit uid list, when non-empty, becomes a leading `uid_in` clause.
/// Clause contents are not validated; that is the store's job.
pub fn compose_filter(uids: &[String], clauses: &[String]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(clauses.len() + 1);
    if !uids.is_empty() {
        let quoted: Vec<String> = uids
            .iter()
            .map(|uid| serde_json::Value::String(uid.clone()).to_string())
            .collect();
        parts.push(format!("uid_in: [{}]", quoted.join(", ")));
    }
    parts.extend(
        clauses
            .iter()
            .map(|clause| clause.trim())
            .filter(|clause| !clause.is_empty())
            .map(ToOwned::to_owned),
    );
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::compose_filter;

    #[test]
    fn clauses_are_joined_with_comma() {
        let clauses = vec![
            "url_contains: \"skat\"".to_string(),
            " isHistoric: false ".to_string(),
        ];
        assert_eq!(
            compose_filter(&[], &clauses),
            "url_contains: \"skat\", isHistoric: false"
        );
    }

    #[test]
    fn uids_lead_the_filter() {
        let uids = vec!["a".to_string(), "b\"c".to_string()];
        let clauses = vec!["url_contains: \"x\"".to_string()];
        assert_eq!(
            compose_filter(&uids, &clauses),
            "uid_in: [\"a\", \"b\\\"c\"], url_contains: \"x\""
        );
    }

    #[test]
    fn empty_inputs_give_empty_filter() {
        assert_eq!(compose_filter(&[], &[String::new()]), "");
    }
}
