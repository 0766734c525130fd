//! Integration tests for types

#[cfg(test)]
mod tests {
    use crucible_types::*;
    use proptest::prelude::*;

    #[test]
    fn test_platform_serialization() {
        let platform = Platform::new(Os::Windows, Arch::X86_64);
        let json = serde_json::to_string(&platform).unwrap();
        assert!(json.contains(r#""os":"windows""#));
        assert!(json.contains(r#""kind":"msvc""#));
        assert!(json.contains(r#""runtime":"MD""#));

        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, platform);
    }

    #[test]
    fn test_apple_clang_serialization() {
        let json = serde_json::to_string(&CompilerKind::AppleClang).unwrap();
        assert_eq!(json, r#""apple-clang""#);
    }

    #[test]
    fn test_option_value_untagged() {
        let values: Vec<OptionValue> = serde_json::from_str(r#"[true, "static"]"#).unwrap();
        assert_eq!(values[0], OptionValue::Bool(true));
        assert_eq!(values[1], OptionValue::Choice("static".into()));
    }

    #[test]
    fn test_package_ref_serialization() {
        let r = PackageRef::parse("openssl/1.1.1g").unwrap();
        assert_eq!(serde_json::to_string(&r).unwrap(), r#""openssl/1.1.1g""#);
    }

    proptest! {
        #[test]
        fn version_order_follows_numbers(a in 0u64..1000, b in 0u64..1000, c in 0u64..1000) {
            let lower = UpstreamVersion::parse(&format!("{a}.{b}")).unwrap();
            let higher = UpstreamVersion::parse(&format!("{a}.{b}.{}", c + 1)).unwrap();
            prop_assert!(lower < higher);
            prop_assert_eq!(
                UpstreamVersion::parse(&format!("{a}.{b}.0")).unwrap(),
                lower
            );
        }

        #[test]
        fn package_ref_display_parses_back(name in "[a-z][a-z0-9-]{0,12}", major in 0u32..50, minor in 0u32..50) {
            let raw = format!("{name}/{major}.{minor}");
            let parsed = PackageRef::parse(&raw).unwrap();
            prop_assert_eq!(parsed.to_string(), raw);
        }
    }
}
