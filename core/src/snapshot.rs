//! Binary snapshots of a built model.
//!
//! A snapshot is a sequence of bincode values written in a fixed order:
//!
//! 1. header (`ALM1` magic, format version)
//! 2. [`ModelMeta`]
//! 3. vocabulary words in id order
//! 4. unigram table
//! 5. bigram table
//! 6. trigram table, only when `meta.is_trigram`
//!
//! Loading reads the same values back and checks that they agree with each
//! other before handing out a model, so a truncated or mismatched file is a
//! format error rather than a model with silently wrong lookups.
//!
//! Every length prefix is bounded by the size of the snapshot itself, so a
//! corrupted prefix fails with a size-limit error instead of allocating.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{LmError, Result};
use crate::model::{LanguageModel, ModelMeta};
use crate::tables::{BigramTable, TrigramTable, UnigramTable};
use crate::vocab::Vocabulary;

const MAGIC: [u8; 4] = *b"ALM1";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

fn read_value<T: DeserializeOwned>(reader: &mut &[u8], limit: u64) -> Result<T> {
    Ok(codec().with_limit(limit).deserialize_from(reader)?)
}

/// Write `model` to `writer`.
pub fn save<W: Write>(model: &LanguageModel, mut writer: W) -> Result<()> {
    let header = Header {
        magic: MAGIC,
        version: FORMAT_VERSION,
    };
    codec().serialize_into(&mut writer, &header)?;
    codec().serialize_into(&mut writer, model.meta())?;
    codec().serialize_into(&mut writer, model.vocab().words())?;
    codec().serialize_into(&mut writer, model.unigram_table())?;
    codec().serialize_into(&mut writer, model.bigram_table())?;
    if let Some(trigrams) = model.trigram_table() {
        codec().serialize_into(&mut writer, trigrams)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a model written by [`save`].
///
/// The whole snapshot is buffered first; its length is the decode limit.
pub fn load<R: Read>(mut source: R) -> Result<LanguageModel> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    let limit = bytes.len() as u64;
    let reader = &mut bytes.as_slice();

    let header: Header = read_value(reader, limit)?;
    if header.magic != MAGIC {
        warn!(magic = ?header.magic, "rejecting snapshot with unknown magic");
        return Err(LmError::format("not a language model snapshot"));
    }
    if header.version != FORMAT_VERSION {
        warn!(version = header.version, "rejecting snapshot version");
        return Err(LmError::format(format!(
            "unsupported snapshot version {} (expected {FORMAT_VERSION})",
            header.version
        )));
    }

    let meta: ModelMeta = read_value(reader, limit)?;
    let words: Vec<String> = read_value(reader, limit)?;
    let vocab = Vocabulary::from_words(words)?;
    let unigrams: UnigramTable = read_value(reader, limit)?;
    let bigrams: BigramTable = read_value(reader, limit)?;
    let trigrams: Option<TrigramTable> = if meta.is_trigram {
        Some(read_value(reader, limit)?)
    } else {
        None
    };

    validate(&meta, &vocab, &unigrams, &bigrams)?;

    let model = LanguageModel::from_parts(meta, vocab, unigrams, bigrams, trigrams);
    info!(
        order = model.order(),
        vocab = model.vocab().len(),
        "loaded model snapshot"
    );
    Ok(model)
}

fn validate(
    meta: &ModelMeta,
    vocab: &Vocabulary,
    unigrams: &UnigramTable,
    bigrams: &BigramTable,
) -> Result<()> {
    if vocab.len() != unigrams.len() {
        return Err(LmError::format(format!(
            "snapshot has {} words but {} unigrams",
            vocab.len(),
            unigrams.len()
        )));
    }
    for id in [meta.start_id, meta.end_id, meta.unk_id] {
        if vocab.word(id).is_none() {
            return Err(LmError::format(format!(
                "reserved id {id} outside vocabulary of {}",
                vocab.len()
            )));
        }
    }
    if bigrams.has_backoff() != meta.is_trigram {
        return Err(LmError::format(
            "bigram table shape does not match model order",
        ));
    }
    Ok(())
}

/// Save to a file through a buffered writer.
pub fn save_to_path<P: AsRef<Path>>(model: &LanguageModel, path: P) -> Result<()> {
    let file = File::create(path)?;
    save(model, BufWriter::new(file))
}

/// Load from a file through a buffered reader.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<LanguageModel> {
    let file = File::open(path)?;
    load(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmConfig;

    const ARPA: &str = "\
\\data\\
ngram 1=5
ngram 2=3
ngram 3=1

\\1-grams:
-99 <s> -0.4
-1.0 </s>
-2.0 <unk>
-0.8 x -0.3
-0.9 y -0.2

\\2-grams:
-0.2 <s> x -0.5
-0.3 x y -0.6
-0.4 y </s>

\\3-grams:
-0.1 <s> x y

\\end\\
";

    fn model() -> LanguageModel {
        crate::arpa::parse(ARPA.as_bytes(), &LmConfig::default()).unwrap()
    }

    fn to_bytes(m: &LanguageModel) -> Vec<u8> {
        let mut buf = Vec::new();
        save(m, &mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trip_preserves_scores() {
        let original = model();
        let restored = load(to_bytes(&original).as_slice()).unwrap();

        assert_eq!(original.meta(), restored.meta());
        assert_eq!(original.vocab().words(), restored.vocab().words());
        for sentence in ["x", "x y", "y x y q", "q q"] {
            assert_eq!(
                original.score_sentence(sentence).unwrap(),
                restored.score_sentence(sentence).unwrap()
            );
            let tokens: Vec<&str> = sentence.split_whitespace().collect();
            assert_eq!(
                original.score_bigram(&tokens).unwrap(),
                restored.score_bigram(&tokens).unwrap()
            );
        }
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = to_bytes(&model());
        bytes[0] = b'X';
        assert!(matches!(
            load(bytes.as_slice()),
            Err(LmError::Format { .. })
        ));
    }

    #[test]
    fn truncated_snapshot_is_an_error() {
        let bytes = to_bytes(&model());
        let cut = &bytes[..bytes.len() / 2];
        assert!(matches!(load(cut), Err(LmError::Format { .. })));
    }

    #[test]
    fn corrupted_length_prefix_is_format_error() {
        let m = model();
        let mut bytes = to_bytes(&m);
        // header (magic + version), meta, then the vocabulary length
        let first_word_len = 8 + bincode::serialized_size(m.meta()).unwrap() as usize + 8;
        assert_eq!(
            &bytes[first_word_len..first_word_len + 8],
            &3u64.to_le_bytes(),
            "`<s>` length prefix"
        );
        bytes[first_word_len..first_word_len + 8].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        assert!(matches!(
            load(bytes.as_slice()),
            Err(LmError::Format { .. })
        ));
    }

    #[test]
    fn corrupted_vocabulary_count_is_format_error() {
        let m = model();
        let mut bytes = to_bytes(&m);
        let vocab_len = 8 + bincode::serialized_size(m.meta()).unwrap() as usize;
        bytes[vocab_len..vocab_len + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            load(bytes.as_slice()),
            Err(LmError::Format { .. })
        ));
    }
}
