#[allow(dead_code)]
mod common;

use cffsubset::binary::read::ReadScope;
use cffsubset::cff::charstring::{compute_used, Usage};
use cffsubset::cff::{CFFVariant, Font, Index, CFF};
use cffsubset::error::SubsetError;
use cffsubset::subset::{subset, CidConversion, SubsetOptions};

use crate::common::{CidBuilder, FontBuilder, FontSetBuilder};

const ENDCHAR: u8 = 14;
const RETURN: u8 = 11;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn objects(index: &Index<'_>) -> Vec<Vec<u8>> {
    index.iter().map(<[u8]>::to_vec).collect()
}

fn usage(data: &[u8], glyph_ids: &[u16]) -> Usage {
    let cff = ReadScope::new(data).read::<CFF<'_>>().unwrap();
    let font = cff.font_at(0).unwrap();
    compute_used(&cff, &font, glyph_ids)
}

fn with_font<T>(data: &[u8], f: impl FnOnce(&CFF<'_>, &Font<'_>) -> T) -> T {
    let cff = ReadScope::new(data).read::<CFF<'_>>().unwrap();
    let font = cff.font_at(0).unwrap();
    f(&cff, &font)
}

/// Glyph 1 calls local subr 2, which calls global subr 5.
fn nested_subrs() -> FontSetBuilder {
    let mut global_subrs = vec![vec![0x8b, RETURN]; 6];
    global_subrs[5] = vec![0x8b, 0x8b, 1, RETURN];
    let mut local_subrs = vec![vec![0x8b, 0x8b, RETURN]; 4];
    // 37 is 5 less the bias of 107
    local_subrs[2] = vec![37, 29, RETURN];

    FontSetBuilder {
        fonts: vec![FontBuilder {
            name: String::from("Nested"),
            // 34 is 2 less the bias of 107
            char_strings: vec![
                vec![0x8b, ENDCHAR],
                vec![34, 10, ENDCHAR],
                vec![0x8b, 0x8b, 0x8b, 0x8b, 5, ENDCHAR],
            ],
            local_subrs,
            ..FontBuilder::default()
        }],
        global_subrs,
        ..FontSetBuilder::default()
    }
}

/// 12 glyphs over two Font DICTs, glyph 10 onwards uses Font DICT 1 and glyph 10 calls its
/// local subr 1.
fn cid_font() -> FontSetBuilder {
    let mut char_strings = vec![vec![ENDCHAR]; 12];
    char_strings[10] = vec![33, 10, ENDCHAR];
    FontSetBuilder {
        fonts: vec![FontBuilder {
            name: String::from("CIDFont"),
            char_strings,
            cid: Some(CidBuilder {
                font_dict_subrs: vec![
                    vec![vec![0x8b, RETURN]],
                    vec![vec![0x8c, RETURN], vec![0x8b, 0x8b, 1, RETURN]],
                ],
                fd_ranges: vec![(0, 0), (10, 1)],
            }),
            ..FontBuilder::default()
        }],
        ..FontSetBuilder::default()
    }
}

#[test]
fn nested_subroutines_are_retained() {
    init_logging();
    let data = nested_subrs().build();
    let output = subset(&data, "Nested", &[0, 1], &SubsetOptions::default()).unwrap();

    let cff = ReadScope::new(&output).read::<CFF<'_>>().unwrap();
    let font = cff.font("Nested").unwrap();
    assert_eq!(
        objects(&font.char_strings_index),
        vec![vec![0x8b, ENDCHAR], vec![34, 10, ENDCHAR], vec![ENDCHAR]]
    );
    assert_eq!(
        objects(font.local_subr_index(0).unwrap()),
        vec![vec![RETURN], vec![RETURN], vec![37, 29, RETURN], vec![RETURN]]
    );
    let mut global_subrs = vec![vec![RETURN]; 6];
    global_subrs[5] = vec![0x8b, 0x8b, 1, RETURN];
    assert_eq!(objects(&cff.global_subr_index), global_subrs);
}

#[test]
fn missing_font_is_an_error() {
    let data = nested_subrs().build();
    let original = data.clone();

    assert_eq!(
        subset(&data, "Missing", &[0], &SubsetOptions::default()),
        Err(SubsetError::FontNotFound(String::from("Missing")))
    );
    assert_eq!(data, original);
}

#[test]
fn cid_font_keeps_unused_font_dicts() {
    init_logging();
    let data = cid_font().build();

    let source_usage = usage(&data, &[10]);
    assert_eq!(source_usage.font_dicts.iter().collect::<Vec<_>>(), vec![1]);
    assert!(source_usage.local_subrs[0].is_empty());
    assert_eq!(source_usage.local_subrs[1].iter().collect::<Vec<_>>(), vec![1]);

    let output = subset(&data, "CIDFont", &[10], &SubsetOptions::default()).unwrap();
    with_font(&output, |_, font| {
        assert_eq!(font.font_dict_count(), 2);
        assert_eq!(objects(font.local_subr_index(0).unwrap()), vec![vec![RETURN]]);
        assert_eq!(
            objects(font.local_subr_index(1).unwrap()),
            vec![vec![RETURN], vec![0x8b, 0x8b, 1, RETURN]]
        );
        match &font.data {
            CFFVariant::CID(cid) => {
                let mut expected = vec![0; 10];
                expected.extend([1, 1]);
                assert_eq!(cid.glyph_font_dicts(), &expected[..]);
            }
            CFFVariant::Type1(_) => panic!("expected a CID-keyed font"),
        }
    });
}

#[test]
fn font_dict_without_subrs_stays_without_subrs() {
    init_logging();
    // Glyph 2 has one stem so its cntrmask is the single byte 10, which isn't a call. Glyph 10
    // calls local subr 0 of Font DICT 1.
    let mut char_strings = vec![vec![ENDCHAR]; 12];
    char_strings[2] = vec![0x8b, 0x8b, 1, 20, 10, ENDCHAR];
    char_strings[10] = vec![32, 10, ENDCHAR];
    let data = FontSetBuilder {
        fonts: vec![FontBuilder {
            name: String::from("CIDFont"),
            char_strings,
            cid: Some(CidBuilder {
                font_dict_subrs: vec![vec![], vec![vec![0x8b, 0x8b, 1, RETURN]]],
                fd_ranges: vec![(0, 0), (10, 1)],
            }),
            ..FontBuilder::default()
        }],
        ..FontSetBuilder::default()
    }
    .build();
    let glyph_ids = [2, 10];

    let source_usage = usage(&data, &glyph_ids);
    assert_eq!(source_usage.char_strings.iter().collect::<Vec<_>>(), vec![2, 10]);
    assert_eq!(source_usage.font_dicts.iter().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(source_usage.local_subrs[1].iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(source_usage.skipped_calls, 0);

    let output = subset(&data, "CIDFont", &glyph_ids, &SubsetOptions::default()).unwrap();
    with_font(&output, |_, font| {
        assert_eq!(font.font_dict_count(), 2);
        assert!(font.local_subr_index(0).is_none());
        assert_eq!(
            objects(font.local_subr_index(1).unwrap()),
            vec![vec![0x8b, 0x8b, 1, RETURN]]
        );
        assert_eq!(
            font.char_strings_index.read_object(2),
            Some(&[0x8b, 0x8b, 1, 20, 10, ENDCHAR][..])
        );
    });
    let output_usage = usage(&output, &glyph_ids);
    assert_eq!(output_usage.skipped_calls, 0);
    assert_eq!(output_usage, source_usage);
}

#[test]
fn output_round_trips() {
    let data = nested_subrs().build();
    let output = subset(&data, "Nested", &[1], &SubsetOptions::default()).unwrap();

    let source_glyphs = with_font(&data, |_, font| font.n_glyphs());
    with_font(&output, |cff, font| {
        assert_eq!(font.n_glyphs(), source_glyphs);
        assert_eq!(cff.name_index.count, 1);
        assert_eq!(cff.top_dict_index.count, 1);
    });
}

#[test]
fn index_counts_are_preserved() {
    for font_set in [nested_subrs(), cid_font()] {
        let data = font_set.build();
        let output = subset(&data, &font_set.fonts[0].name, &[1], &SubsetOptions::default())
            .unwrap();

        let counts = |cff: &CFF<'_>, font: &Font<'_>| {
            let local_counts = (0..font.font_dict_count())
                .map(|font_dict| font.local_subr_index(font_dict).map(|index| index.count))
                .collect::<Vec<_>>();
            (
                font.char_strings_index.count,
                cff.global_subr_index.count,
                local_counts,
            )
        };
        assert_eq!(with_font(&output, counts), with_font(&data, counts));
    }
}

#[test]
fn unused_objects_are_placeholders() {
    let data = nested_subrs().build();
    let glyph_ids = [1];
    let output = subset(&data, "Nested", &glyph_ids, &SubsetOptions::default()).unwrap();
    let used = usage(&data, &glyph_ids);

    with_font(&output, |cff, font| {
        for (i, object) in font.char_strings_index.iter().enumerate() {
            if !used.char_strings.contains(i) {
                assert_eq!(object, &[ENDCHAR]);
            }
        }
        for (i, object) in cff.global_subr_index.iter().enumerate() {
            if !used.global_subrs.contains(i) {
                assert_eq!(object, &[RETURN]);
            }
        }
        for (i, object) in font.local_subr_index(0).unwrap().iter().enumerate() {
            if !used.local_subrs[0].contains(i) {
                assert_eq!(object, &[RETURN]);
            }
        }
    });
}

#[test]
fn output_has_the_same_reachable_objects() {
    for (font_set, glyph_ids) in [(nested_subrs(), vec![0, 1]), (cid_font(), vec![3, 10])] {
        let data = font_set.build();
        let output =
            subset(&data, &font_set.fonts[0].name, &glyph_ids, &SubsetOptions::default()).unwrap();

        assert_eq!(usage(&output, &glyph_ids), usage(&data, &glyph_ids));
    }
}

#[test]
fn subsetting_twice_is_stable() {
    let data = nested_subrs().build();
    let glyph_ids = [1, 2];
    let once = subset(&data, "Nested", &glyph_ids, &SubsetOptions::default()).unwrap();
    let twice = subset(&once, "Nested", &glyph_ids, &SubsetOptions::default()).unwrap();

    assert_eq!(usage(&twice, &glyph_ids), usage(&once, &glyph_ids));
    let char_strings = |_: &CFF<'_>, font: &Font<'_>| objects(&font.char_strings_index);
    assert_eq!(with_font(&twice, char_strings), with_font(&once, char_strings));
}

#[test]
fn subroutine_bias_boundary() {
    // With 1239 subrs the bias is 107 and 32 calls subr 0. With 1240 it is 1131, reached with
    // 254 255.
    for (count, glyph) in [
        (1239, vec![32, 29, ENDCHAR]),
        (1240, vec![254, 255, 29, ENDCHAR]),
    ] {
        let mut global_subrs = vec![vec![0x8b, RETURN]; count];
        global_subrs[0] = vec![0x8c, RETURN];
        let data = FontSetBuilder {
            fonts: vec![FontBuilder {
                name: String::from("Bias"),
                char_strings: vec![vec![ENDCHAR], glyph],
                ..FontBuilder::default()
            }],
            global_subrs,
            ..FontSetBuilder::default()
        }
        .build();

        let used = usage(&data, &[1]);
        assert_eq!(used.global_subrs.iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(used.skipped_calls, 0);
    }
}

#[test]
fn font_without_conversion_keeps_its_private_dict() {
    let data = nested_subrs().build();
    let options = SubsetOptions {
        cid_conversion: CidConversion::Never,
        ..SubsetOptions::default()
    };
    let output = subset(&data, "Nested", &[1], &options).unwrap();

    with_font(&output, |cff, font| {
        assert!(!font.is_cid_keyed());
        assert_eq!(cff.string_index.count, 0);
        assert_eq!(
            objects(font.local_subr_index(0).unwrap()),
            vec![vec![RETURN], vec![RETURN], vec![37, 29, RETURN], vec![RETURN]]
        );
    });
}

#[test]
fn conversion_appends_strings() {
    let mut font_set = nested_subrs();
    font_set.strings = vec![String::from("Identity"), String::from("Extra")];
    let data = font_set.build();
    let output = subset(&data, "Nested", &[1], &SubsetOptions::default()).unwrap();

    with_font(&output, |cff, _| {
        let strings = objects(&cff.string_index);
        assert_eq!(
            strings,
            vec![
                b"Identity".to_vec(),
                b"Extra".to_vec(),
                b"Adobe".to_vec(),
                b"Nested-OneRange".to_vec(),
            ]
        );
    });
}

#[test]
fn font_is_selected_by_name() {
    let font = |name: &str, glyph: u8| FontBuilder {
        name: String::from(name),
        char_strings: vec![vec![ENDCHAR], vec![glyph, ENDCHAR]],
        ..FontBuilder::default()
    };
    let data = FontSetBuilder {
        fonts: vec![font("First", 0x8c), font("Second", 0x8d)],
        ..FontSetBuilder::default()
    }
    .build();

    let output = subset(&data, "Second", &[1], &SubsetOptions::default()).unwrap();
    let cff = ReadScope::new(&output).read::<CFF<'_>>().unwrap();
    assert_eq!(cff.font_names().collect::<Vec<_>>(), vec![&b"Second"[..]]);
    let font = cff.font("Second").unwrap();
    assert_eq!(font.char_strings_index.read_object(1), Some(&[0x8d, ENDCHAR][..]));
    assert!(matches!(cff.font("First"), Err(SubsetError::FontNotFound(_))));
}

#[test]
fn glyph_ids_outside_the_font_are_ignored() {
    init_logging();
    let data = nested_subrs().build();
    let output = subset(&data, "Nested", &[1, 300], &SubsetOptions::default()).unwrap();

    with_font(&output, |_, font| {
        assert_eq!(font.n_glyphs(), 3);
        assert_eq!(font.char_strings_index.read_object(1), Some(&[34, 10, ENDCHAR][..]));
    });
}
