//! Integration Tests for Feature Extraction
//!
//! Drive extraction end to end over synthetic images from `PeBuilder`.

#[cfg(test)]
mod integration_tests {
    use crate::error::TriageError;
    use crate::logic::entropy::shannon_entropy;
    use crate::logic::features::{
        extract_features, ExtractionPolicy, StaticReport, FEATURE_COUNT, FEATURE_LAYOUT,
    };
    use crate::logic::pe::fixtures::PeBuilder;
    use crate::logic::pe::{HeaderFault, PeValidity};
    use crate::logic::upload::RawArtifact;

    fn sample_image() -> Vec<u8> {
        PeBuilder::new()
            .timestamp(1_650_000_000)
            .characteristics(0x2102)
            .dll_characteristics(0x8140)
            .major_image_version(6)
            .section(".text", (0..=255u8).cycle().take(1024).collect())
            .section(".rsrc", vec![0x11; 256])
            .import("KERNEL32.dll", &["CreateFileW", "ReadFile", "CloseHandle"])
            .import("ADVAPI32.dll", &["RegOpenKeyExW"])
            .with_valid_checksum()
            .build()
    }

    /// All eight fields come from the right header locations
    #[test]
    fn test_full_vector_from_valid_image() {
        let image = sample_image();
        let vector = extract_features(&image, ExtractionPolicy::Strict).unwrap();

        assert!(vector.is_complete());
        assert_eq!(vector.entropy, shannon_entropy(&image));
        assert_eq!(vector.length, image.len() as u64);
        assert_eq!(vector.number_of_sections, Some(3)); // .text .rsrc .idata
        assert_eq!(vector.time_date_stamp, Some(1_650_000_000));
        assert_eq!(vector.characteristics, Some(0x2102));
        assert_eq!(vector.dll_characteristics, Some(0x8140));
        assert_eq!(vector.import_count, Some(4));
        assert_eq!(vector.checksum_invalid, Some(false));
        assert_eq!(vector.values().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_no_import_directory_counts_zero() {
        let image = PeBuilder::new().section(".text", vec![0x90; 128]).build();
        let vector = extract_features(&image, ExtractionPolicy::Strict).unwrap();
        assert_eq!(vector.import_count, Some(0));
        // Builder leaves CheckSum at zero
        assert_eq!(vector.checksum_invalid, Some(true));
    }

    #[test]
    fn test_tampered_trailing_byte_flips_checksum_only() {
        let mut image = sample_image();
        let before = extract_features(&image, ExtractionPolicy::Strict).unwrap();
        let last = image.len() - 1;
        image[last] ^= 0x5a;
        let after = extract_features(&image, ExtractionPolicy::Strict).unwrap();

        assert_eq!(before.checksum_invalid, Some(false));
        assert_eq!(after.checksum_invalid, Some(true));
        assert_eq!(before.import_count, after.import_count);
        assert_eq!(before.number_of_sections, after.number_of_sections);
    }

    /// Same bytes, same vector, every time
    #[test]
    fn test_extraction_is_deterministic() {
        let image = sample_image();
        let first = extract_features(&image, ExtractionPolicy::Strict).unwrap();
        for _ in 0..10 {
            let again = extract_features(&image.clone(), ExtractionPolicy::Strict).unwrap();
            assert_eq!(first, again);
            assert_eq!(first.values(), again.values());
        }
    }

    #[test]
    fn test_non_pe_rejected_as_invalid_format() {
        for data in [&b""[..], b"hello world", b"PK\x03\x04zip", b"\x7fELF\x02\x01\x01"] {
            for policy in [ExtractionPolicy::Strict, ExtractionPolicy::Degraded] {
                assert_eq!(extract_features(data, policy), Err(TriageError::InvalidFormat));
            }
        }
    }

    #[test]
    fn test_malformed_header_rejected_under_strict() {
        let mut image = sample_image();
        image[0x3c..0x40].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());
        match extract_features(&image, ExtractionPolicy::Strict) {
            Err(TriageError::MalformedHeader(HeaderFault::LfanewOutOfBounds { .. })) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_degraded_still_rejects_unreadable_coff() {
        let mut image = sample_image();
        image[0x3c..0x40].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());
        assert!(matches!(
            extract_features(&image, ExtractionPolicy::Degraded),
            Err(TriageError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_degraded_yields_partial_vector() {
        let mut image = sample_image();
        let size_field = PeBuilder::E_LFANEW as usize + 4 + 16;
        image[size_field..size_field + 2].copy_from_slice(&0xfff0u16.to_le_bytes());

        assert!(matches!(
            extract_features(&image, ExtractionPolicy::Strict),
            Err(TriageError::MalformedHeader(HeaderFault::SectionTableOutOfBounds { .. }))
        ));

        let vector = extract_features(&image, ExtractionPolicy::Degraded).unwrap();
        assert_eq!(vector.number_of_sections, Some(3));
        assert_eq!(vector.time_date_stamp, Some(1_650_000_000));
        assert_eq!(vector.import_count, None);
        assert_eq!(vector.checksum_invalid, None);
        assert_eq!(vector.missing_fields(), vec!["import_count", "checksum_invalid"]);
    }

    #[test]
    fn test_unreadable_imports_follow_policy() {
        let mut image = PeBuilder::new().section(".text", vec![0; 32]).build();
        let entry = PeBuilder::OPTIONAL_HEADER_OFFSET + 96 + 8;
        image[entry..entry + 4].copy_from_slice(&0x00ff_0000u32.to_le_bytes());
        image[entry + 4..entry + 8].copy_from_slice(&40u32.to_le_bytes());

        assert!(matches!(
            extract_features(&image, ExtractionPolicy::Strict),
            Err(TriageError::ExtractionFailure(_))
        ));
        let vector = extract_features(&image, ExtractionPolicy::Degraded).unwrap();
        assert_eq!(vector.import_count, None);
        assert_eq!(vector.number_of_sections, Some(1));
    }

    #[test]
    fn test_static_report_for_valid_image() {
        let artifact = RawArtifact::new("sample.exe", sample_image());
        let report = StaticReport::analyze(&artifact, ExtractionPolicy::Strict);

        assert_eq!(report.validity, PeValidity::Valid);
        assert_eq!(report.sha256, artifact.sha256());
        assert!(!report.is_rejected());
        assert_eq!(report.sections.len(), 3);
        assert_eq!(report.sections[0].section.name, ".text");
        assert_eq!(report.sections[0].entropy, Some(8.0));
        assert_eq!(report.sections[1].entropy, Some(1.0)); // 256 of 0x11, 256 of padding
        assert_eq!(report.imports.len(), 2);
        assert!(!report.imports_truncated);
        assert_eq!(report.imports[0].library, "KERNEL32.dll");
        assert_eq!(report.imports[0].functions, vec!["CreateFileW", "ReadFile", "CloseHandle"]);

        let extended = report.extended.as_ref().unwrap();
        assert_eq!(extended.major_image_version, 6);
        assert_eq!(extended.dll_count, Some(2));
        assert_eq!(extended.import_count, Some(4));
        assert_eq!(extended.non_suspicious_section_names, 3);
        assert_eq!(extended.suspicious_section_names, 0);
        assert_eq!(extended.text_section_entropy, Some(8.0));
    }

    #[test]
    fn test_section_entropy_stops_at_budget() {
        let mut image = PeBuilder::new()
            .section(".a", vec![1; 16])
            .section(".b", vec![2; 16])
            .section(".c", vec![3; 16])
            .section(".d", vec![4; 16])
            .build();
        // Every section claims the whole file
        for index in 0..4 {
            let header = PeBuilder::section_header_offset(false, index);
            image[header + 16..header + 20].copy_from_slice(&u32::MAX.to_le_bytes());
            image[header + 20..header + 24].copy_from_slice(&0u32.to_le_bytes());
        }

        let report = StaticReport::analyze(&RawArtifact::new("wide.exe", image), ExtractionPolicy::Strict);
        let hashed: Vec<bool> = report.sections.iter().map(|s| s.entropy.is_some()).collect();
        assert_eq!(hashed, vec![true, true, false, false]);
    }

    #[test]
    fn test_static_report_for_rejected_inputs() {
        let artifact = RawArtifact::new("notes.txt", b"plain text".to_vec());
        let report = StaticReport::analyze(&artifact, ExtractionPolicy::Strict);
        assert_eq!(report.validity, PeValidity::NotExecutableFormat);
        assert!(report.is_rejected());
        assert!(report.features.is_none());
        assert!(report.extended.is_none());

        let artifact = RawArtifact::new("broken.exe", b"MZ\x90\x00".to_vec());
        let report = StaticReport::analyze(&artifact, ExtractionPolicy::Strict);
        assert_eq!(report.validity, PeValidity::MalformedPeHeader);
        assert!(report.fault.is_some());
        assert!(report.rejection.as_deref().unwrap().contains("SUSPICIOUS FILE ALERT"));
    }

    #[test]
    fn test_report_serializes_feature_names() {
        let artifact = RawArtifact::new("sample.exe", sample_image());
        let report = StaticReport::analyze(&artifact, ExtractionPolicy::Strict);
        let json = serde_json::to_value(&report).unwrap();
        for name in FEATURE_LAYOUT {
            assert!(json["features"].get(*name).is_some(), "missing {}", name);
        }
        assert_eq!(json["validity"], "valid");
    }
}
