use std::collections::BTreeMap;

/// Groups `symbols` by the provider that serves them.
///
/// A symbol goes to provider `TAG` when it reads `TAG:<rest>` and `TAG` is one of
/// `sources`; everything else, exchange-qualified names like `BINANCE:BTCUSDT`
/// included, goes to `default_source`. Symbols keep their configured order and
/// duplicates are dropped.
pub fn partition_symbols<S: AsRef<str>>(
    symbols: &[S],
    sources: &[&str],
    default_source: &str,
) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for symbol in symbols.iter().map(AsRef::as_ref) {
        let source = match symbol.split_once(':') {
            Some((tag, rest)) if !rest.is_empty() && sources.contains(&tag) => tag,
            _ => default_source,
        };
        let group = groups.entry(source.to_string()).or_default();
        if !group.iter().any(|s| s == symbol) {
            group.push(symbol.to_string());
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_prefix_selects_provider() {
        let groups = partition_symbols(
            &["AAPL", "CG:bitcoin", "BINANCE:BTCUSDT", "CG:ethereum", "AAPL"],
            &["FH", "CG"],
            "FH",
        );
        assert_eq!(groups["FH"], vec!["AAPL", "BINANCE:BTCUSDT"]);
        assert_eq!(groups["CG"], vec!["CG:bitcoin", "CG:ethereum"]);
    }

    #[test]
    fn test_bare_tag_goes_to_default() {
        let groups = partition_symbols(&["CG:"], &["CG"], "FH");
        assert_eq!(groups["FH"], vec!["CG:"]);
        assert!(!groups.contains_key("CG"));
    }
}
