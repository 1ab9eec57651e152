use proptest::prelude::*;
use sdk::errors::{PackageError, PackageErrorExt};
use sdk::manifest::{parse_registry, registry_to_json, PackageDescriptor, PackageVersion, Repository};

proptest! {
    #[test]
    fn test_error_user_hint_completeness(detail in "\\PC*") {
        let errs = vec![
            PackageError::ConnectionLost(detail.clone()),
            PackageError::MalformedRegistry(detail.clone()),
            PackageError::UnknownPackage(detail.clone()),
            PackageError::UnrecognizedCommand(detail.clone()),
            PackageError::KeyFetchFailed { url: detail.clone(), reason: detail.clone() },
            PackageError::InstallFailed { package: detail.clone(), reason: detail.clone() },
            PackageError::Serialization(detail.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            // Hints are static and never echo the raw detail
            if detail.len() > 8 {
                prop_assert!(!hint.contains(detail.as_str()));
            }
        }
    }
}

proptest! {
    #[test]
    fn test_registry_roundtrip(
        entries in prop::collection::vec(
            ("[a-z][a-z0-9-]{0,12}", "https?://[a-z]{1,10}\\.test(/[a-z]{1,8}){0,2}", "[a-z]{1,8}\\.json"),
            0..8,
        )
    ) {
        let repositories: Vec<Repository> = entries
            .into_iter()
            .map(|(id, url, manifest_file)| Repository { id, url, manifest_file })
            .collect();

        let bytes = registry_to_json(&repositories).expect("serialize registry");
        let parsed = parse_registry(&bytes).expect("parse registry");

        prop_assert_eq!(parsed, repositories);
    }
}

proptest! {
    #[test]
    fn test_latest_release_is_last_element(
        versions in prop::collection::vec("[0-9]{1,3}\\.[0-9]{1,3}", 1..10)
    ) {
        let package = PackageDescriptor {
            id: "pkg".to_string(),
            description: String::new(),
            versions: versions
                .iter()
                .map(|v| PackageVersion::new(v.clone(), format!("http://repo.test/pkg-{}.jar", v)))
                .collect(),
        };

        let latest = package.latest().expect("non-empty versions");
        prop_assert_eq!(&latest.version, versions.last().expect("non-empty"));
        prop_assert!(!package.has_update_from(&latest.version));
    }
}
