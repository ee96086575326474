// End-to-end checks: ARPA file on disk -> model -> scores -> snapshot -> scores.

use arpa_lm::{
    load_model, load_saved_model, save_model, LanguageModel, LmConfig, LmError,
    MissingEntryPolicy,
};
use std::f64::consts::LN_10;
use std::path::PathBuf;

const HELLO_ARPA: &str = "\
\\data\\
ngram 1=5
ngram 2=1

\\1-grams:
-0.0 <s>
-0.5 </s>
-2.0 <unk>
-1.0 hello -0.1
-1.2 again

\\2-grams:
-0.3 hello again

\\end\\
";

const TRIGRAM_ARPA: &str = "\
\\data\\
ngram 1=6
ngram 2=5
ngram 3=2

\\1-grams:
-99 <s> -0.5
-1.1 </s>
-2.5 <unk>
-0.9 the -0.4
-1.3 cat -0.2
-1.6 sat -0.3

\\2-grams:
-0.2 <s> the -0.6
-0.5 the cat -0.15
-0.7 cat sat -0.25
-0.0 sat </s> -0.05
-0.8 the sat

\\3-grams:
-0.1 <s> the cat
-0.05 the cat sat

\\end\\
";

fn temp_path(tag: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "arpa_lm_{}_{}_{}.{}",
        tag,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos(),
        ext
    ))
}

fn write_arpa(tag: &str, text: &str) -> PathBuf {
    let path = temp_path(tag, "arpa");
    std::fs::write(&path, text).expect("write arpa");
    path
}

fn parse(text: &str, config: &LmConfig) -> Result<LanguageModel, LmError> {
    LanguageModel::from_arpa_reader(text.as_bytes(), config)
}

#[test]
fn hello_again_scenario() {
    let path = write_arpa("hello", HELLO_ARPA);
    let m = load_model(&path, &LmConfig::default()).expect("load model");
    let _ = std::fs::remove_file(&path);

    let s = m.start_id();
    let hello = m.word_id("hello");
    let again = m.word_id("again");

    // <s> has no explicit backoff, so P(hello | <s>) is just the unigram
    let first = m.bigram_prob(s, hello);
    assert!((first - LN_10 * -1.0).abs() < 1e-12);
    // explicit entry
    assert_eq!(m.bigram_prob(hello, again), LN_10 * -0.3);

    let score = m.score_bigram(&["hello", "again"]).unwrap();
    assert_eq!(score, first + LN_10 * -0.3);
    assert!((score - LN_10 * (-1.0 + -0.3)).abs() < 1e-12);
}

#[test]
fn vocabulary_matches_declaration() {
    let m = parse(HELLO_ARPA, &LmConfig::default()).unwrap();
    assert_eq!(m.vocab().len(), 5);
    for id in 0..m.vocab().len() as u32 {
        let word = m.vocab().word(id).expect("every id has a word");
        assert_eq!(m.word_id(word), id);
    }
}

#[test]
fn unknown_words_share_unk_id() {
    let m = parse(HELLO_ARPA, &LmConfig::default()).unwrap();
    for w in ["goodbye", "HELLO", "", "hello again"] {
        assert_eq!(m.word_id(w), m.word_id("<unk>"));
    }
    assert_eq!(
        m.score_bigram(&["hello", "mystery"]).unwrap(),
        m.score_bigram(&["hello", "<unk>"]).unwrap()
    );
}

#[test]
fn bigram_backoff_uses_context_weight() {
    let m = parse(HELLO_ARPA, &LmConfig::default()).unwrap();
    let hello = m.word_id("hello");
    let end = m.end_id();
    assert!(m.bigram_entry(hello, end).is_none());
    assert_eq!(
        m.bigram_prob(hello, end),
        m.unigram_backoff(hello) + m.unigram_logprob(end)
    );
}

#[test]
fn trigram_backoff_to_explicit_bigram() {
    let m = parse(TRIGRAM_ARPA, &LmConfig::default()).unwrap();
    let (s, the, cat, sat) = (
        m.start_id(),
        m.word_id("the"),
        m.word_id("cat"),
        m.word_id("sat"),
    );

    assert_eq!(m.trigram_prob(s, the, cat).unwrap(), LN_10 * -0.1);

    // (<s>, the, sat) missing, (the, sat) explicit
    assert!(m.trigram_entry(s, the, sat).is_none());
    let expected = m.bigram_entry(the, sat).unwrap().log_prob + m.bigram_entry(s, the).unwrap().backoff;
    assert_eq!(m.trigram_prob(s, the, sat).unwrap(), expected);

    // (sat, the, cat): context (sat, the) missing so its backoff is 0.0
    let expected = m.bigram_prob(the, cat);
    assert_eq!(m.trigram_prob(sat, the, cat).unwrap(), expected);
}

#[test]
fn trigram_sequence_score() {
    let m = parse(TRIGRAM_ARPA, &LmConfig::default()).unwrap();
    let (s, e) = (m.start_id(), m.end_id());
    let (the, cat, sat) = (m.word_id("the"), m.word_id("cat"), m.word_id("sat"));

    let expected = m.trigram_prob(s, s, the).unwrap()
        + m.trigram_prob(s, the, cat).unwrap()
        + m.trigram_prob(the, cat, sat).unwrap();
    assert_eq!(m.score_trigram(&["the", "cat", "sat"]).unwrap(), expected);

    let single = m.trigram_prob(s, s, cat).unwrap() + m.trigram_prob(s, cat, e).unwrap();
    assert_eq!(m.score_trigram(&["cat"]).unwrap(), single);
}

#[test]
fn sentence_end_term_is_opt_in() {
    let plain = parse(HELLO_ARPA, &LmConfig::default()).unwrap();
    let cfg = LmConfig {
        score_sentence_end: true,
        ..LmConfig::default()
    };
    let with_end = parse(HELLO_ARPA, &cfg).unwrap();

    let base = plain.score_sentence("hello again").unwrap();
    let again = with_end.word_id("again");
    assert_eq!(
        with_end.score_sentence("hello again").unwrap(),
        base + with_end.bigram_prob(again, with_end.end_id())
    );
}

#[test]
fn zero_policy_backs_off_on_zero_logprob() {
    let presence = parse(TRIGRAM_ARPA, &LmConfig::default()).unwrap();
    let zero = parse(
        TRIGRAM_ARPA,
        &LmConfig {
            missing_entry: MissingEntryPolicy::Zero,
            ..LmConfig::default()
        },
    )
    .unwrap();

    let (sat, end) = (presence.word_id("sat"), presence.end_id());
    // `-0.0 sat </s>` is an explicit entry under key presence
    assert_eq!(presence.bigram_prob(sat, end), 0.0);
    assert_eq!(
        zero.bigram_prob(sat, end),
        zero.unigram_backoff(sat) + zero.unigram_logprob(end)
    );
}

#[test]
fn scorer_argument_errors() {
    let bigram = parse(HELLO_ARPA, &LmConfig::default()).unwrap();
    let empty: Vec<String> = Vec::new();
    assert!(matches!(
        bigram.score_bigram(&empty),
        Err(LmError::InvalidArgument(_))
    ));
    assert!(matches!(
        bigram.score_trigram(&["hello"]),
        Err(LmError::Unsupported(_))
    ));
}

#[test]
fn malformed_inputs_are_format_errors() {
    let cases = [
        HELLO_ARPA.replace("\\data\\", ""),
        HELLO_ARPA.replace("ngram 1=5", "ngram 1=6"),
        HELLO_ARPA.replace("\\2-grams:", "\\two-grams:"),
        HELLO_ARPA.replace("-0.3 hello again", "-0.3 hello"),
        HELLO_ARPA.replace("-1.2 again", "minus again"),
        TRIGRAM_ARPA.replace("\\3-grams:", ""),
    ];
    for text in &cases {
        let err = parse(text, &LmConfig::default()).unwrap_err();
        assert!(matches!(err, LmError::Format { .. }), "{err}");
    }
}

#[test]
fn missing_file_is_io_error() {
    let path = temp_path("absent", "arpa");
    assert!(matches!(
        load_model(&path, &LmConfig::default()),
        Err(LmError::Io(_))
    ));
}

#[test]
fn snapshot_file_round_trip() {
    let cfg = LmConfig {
        missing_entry: MissingEntryPolicy::Zero,
        score_sentence_end: true,
        ..LmConfig::default()
    };
    let original = parse(TRIGRAM_ARPA, &cfg).unwrap();

    let path = temp_path("snapshot", "bincode");
    save_model(&original, &path).expect("save snapshot");
    let restored = load_saved_model(&path).expect("load snapshot");
    let _ = std::fs::remove_file(&path);

    assert_eq!(original.meta(), restored.meta());
    assert_eq!(original.stats(), restored.stats());
    for sentence in [
        vec!["the"],
        vec!["the", "cat"],
        vec!["the", "cat", "sat"],
        vec!["sat", "dog", "the", "cat"],
    ] {
        assert_eq!(
            original.score_bigram(&sentence).unwrap(),
            restored.score_bigram(&sentence).unwrap()
        );
        assert_eq!(
            original.score_trigram(&sentence).unwrap(),
            restored.score_trigram(&sentence).unwrap()
        );
    }
}

#[test]
fn config_file_drives_reserved_tokens() {
    let text = HELLO_ARPA
        .replace("<s>", "<S>")
        .replace("</s>", "</S>")
        .replace("<unk>", "<UNK>");
    let arpa = write_arpa("tokens", &text);
    let cfg_path = temp_path("tokens", "toml");
    LmConfig::with_tokens("<S>", "</S>", "<UNK>")
        .save_toml(&cfg_path)
        .expect("save config");

    let cfg = LmConfig::load_toml(&cfg_path).expect("load config");
    let m = load_model(&arpa, &cfg).expect("load model");
    let _ = std::fs::remove_file(&arpa);
    let _ = std::fs::remove_file(&cfg_path);

    assert_eq!(m.vocab().word(m.start_id()), Some("<S>"));
    assert_eq!(m.word_id("nothing"), m.word_id("<UNK>"));
    assert!(parse(&text, &LmConfig::default()).is_err());
}
