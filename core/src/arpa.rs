//! ARPA backoff language model reader.
//!
//! Reads bigram and trigram models in the standard layout:
//!
//! ```text
//! \data\
//! ngram 1=<count>
//! ngram 2=<count>
//! ngram 3=<count>          (optional)
//!
//! \1-grams:
//! <log10_prob> <word> [<log10_backoff>]
//!
//! \2-grams:
//! <log10_prob> <word1> <word2> [<log10_backoff>]
//!
//! \3-grams:
//! <log10_prob> <word1> <word2> <word3>
//!
//! \end\
//! ```
//!
//! Sections are read strictly in order. Every value is multiplied by ln 10 on
//! the way in so the model works in natural logs.

use std::io::{BufRead, Lines};
use tracing::{debug, info};

use crate::error::{LmError, Result};
use crate::model::{LanguageModel, ModelMeta};
use crate::tables::{BigramTable, ProbBackoff, TrigramTable, UnigramTable};
use crate::vocab::{Vocabulary, WordId};
use crate::LmConfig;

/// log10 -> ln conversion factor.
pub const LOG10_TO_LN: f64 = std::f64::consts::LN_10;

const DATA_MARKER: &str = "\\data\\";

/// Upper bound on pre-allocation from an untrusted `ngram 1=` count.
const MAX_CAPACITY_HINT: usize = 1 << 16;

/// Line source with one line of push-back and 1-based line numbers.
struct ArpaLines<R> {
    lines: Lines<R>,
    line_no: usize,
    pending: Option<String>,
}

impl<R: BufRead> ArpaLines<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pending: None,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn push_back(&mut self, line: String) {
        self.pending = Some(line);
    }

    fn skip_until<F>(&mut self, what: &str, mut found: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        while let Some(line) = self.next_line()? {
            if found(line.trim())? {
                return Ok(());
            }
        }
        Err(LmError::format_at(self.line_no, format!("missing {what}")))
    }
}

fn section_marker(order: usize) -> String {
    format!("\\{order}-grams")
}

/// Parse an `ngram N=count` header line.
fn parse_declaration(line: &str) -> Option<(usize, usize)> {
    let rest = line.trim().strip_prefix("ngram")?;
    let (order, count) = rest.split_once('=')?;
    Some((order.trim().parse().ok()?, count.trim().parse().ok()?))
}

fn expect_declaration<R: BufRead>(lines: &mut ArpaLines<R>, order: usize) -> Result<usize> {
    let line = lines.next_line()?.unwrap_or_default();
    match parse_declaration(&line) {
        Some((n, count)) if n == order => Ok(count),
        _ => Err(LmError::format_at(
            lines.line_no,
            format!("expected `ngram {order}=<count>`, found {:?}", line.trim()),
        )),
    }
}

fn parse_float(field: &str, line: usize) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| LmError::format_at(line, format!("invalid number {field:?}")))
}

fn resolve(vocab: &Vocabulary, word: &str, line: usize) -> Result<WordId> {
    vocab
        .get(word)
        .ok_or_else(|| LmError::format_at(line, format!("word {word:?} is not a unigram")))
}

/// Feed each record of the current section to `on_record` until a blank line,
/// the end marker, the next section marker or end of input.
fn read_records<R, F>(lines: &mut ArpaLines<R>, mut on_record: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(&[&str], usize) -> Result<()>,
{
    let mut count = 0;
    while let Some(line) = lines.next_line()? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        // records start with a number; anything starting with '\' is a
        // section marker or `\end\`
        if trimmed.starts_with('\\') {
            lines.push_back(line);
            break;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        on_record(&fields, lines.line_no)?;
        count += 1;
    }
    Ok(count)
}

fn check_count(order: usize, declared: usize, read: usize, line: usize) -> Result<()> {
    debug!(order, declared, read, "read n-gram section");
    if declared != read {
        return Err(LmError::format_at(
            line,
            format!(
                "declared ngram {order}={declared} but section has {read} records"
            ),
        ));
    }
    Ok(())
}

/// Parse an ARPA model from `reader`.
///
/// The reader is consumed; on error no model is produced.
pub fn parse<R: BufRead>(reader: R, config: &LmConfig) -> Result<LanguageModel> {
    let mut lines = ArpaLines::new(reader);
    let scale = LOG10_TO_LN;

    // header
    lines.skip_until("\\data\\ marker", |l| Ok(l == DATA_MARKER))?;
    let unigram_count = expect_declaration(&mut lines, 1)?;
    let bigram_count = expect_declaration(&mut lines, 2)?;
    let trigram_count = match lines.next_line()? {
        Some(line) => match parse_declaration(&line) {
            Some((3, count)) => Some(count),
            _ => {
                lines.push_back(line);
                None
            }
        },
        None => None,
    };
    let is_trigram = trigram_count.is_some();

    let unigram_marker = section_marker(1);
    lines.skip_until("\\1-grams: section", |l| {
        if let Some((order, _)) = parse_declaration(l) {
            if order > 3 {
                return Err(LmError::format(format!(
                    "ngram {order} declared; only bigram and trigram models are supported"
                )));
            }
        }
        Ok(l.starts_with(&unigram_marker))
    })?;

    // unigrams; the declared count is only a size hint until check_count
    let hint = unigram_count.min(MAX_CAPACITY_HINT);
    let mut vocab = Vocabulary::with_capacity(hint);
    let mut unigrams = UnigramTable::with_capacity(hint);
    let read = read_records(&mut lines, |fields, line| {
        if fields.len() != 2 && fields.len() != 3 {
            return Err(LmError::format_at(
                line,
                format!("unigram record needs 2 or 3 fields, got {}", fields.len()),
            ));
        }
        let log_prob = parse_float(fields[0], line)?;
        let backoff = match fields.get(2) {
            Some(f) => parse_float(f, line)?,
            None => 0.0,
        };
        vocab.insert(fields[1]).map_err(|err| match err {
            LmError::Format { message, .. } => LmError::format_at(line, message),
            other => other,
        })?;
        unigrams.push(ProbBackoff::new(scale * log_prob, scale * backoff));
        Ok(())
    })?;
    check_count(1, unigram_count, read, lines.line_no)?;

    // bigrams
    let bigram_marker = section_marker(2);
    lines.skip_until("\\2-grams: section", |l| Ok(l.starts_with(&bigram_marker)))?;
    let mut bigrams = BigramTable::new(is_trigram);
    let read = read_records(&mut lines, |fields, line| {
        if fields.len() != 3 && fields.len() != 4 {
            return Err(LmError::format_at(
                line,
                format!("bigram record needs 3 or 4 fields, got {}", fields.len()),
            ));
        }
        let log_prob = parse_float(fields[0], line)?;
        let backoff = match fields.get(3) {
            Some(f) => parse_float(f, line)?,
            None => 0.0,
        };
        let key = (
            resolve(&vocab, fields[1], line)?,
            resolve(&vocab, fields[2], line)?,
        );
        bigrams.insert(key, ProbBackoff::new(scale * log_prob, scale * backoff));
        Ok(())
    })?;
    check_count(2, bigram_count, read, lines.line_no)?;

    // trigrams
    let trigrams = match trigram_count {
        Some(declared) => {
            let trigram_marker = section_marker(3);
            lines.skip_until("\\3-grams: section", |l| Ok(l.starts_with(&trigram_marker)))?;
            let mut trigrams = TrigramTable::new();
            let read = read_records(&mut lines, |fields, line| {
                if fields.len() != 4 {
                    return Err(LmError::format_at(
                        line,
                        format!("trigram record needs 4 fields, got {}", fields.len()),
                    ));
                }
                let log_prob = parse_float(fields[0], line)?;
                let key = (
                    resolve(&vocab, fields[1], line)?,
                    resolve(&vocab, fields[2], line)?,
                    resolve(&vocab, fields[3], line)?,
                );
                trigrams.insert(key, scale * log_prob);
                Ok(())
            })?;
            check_count(3, declared, read, lines.line_no)?;
            Some(trigrams)
        }
        None => None,
    };

    // reserved tokens
    let reserved = |token: &str| {
        vocab.get(token).ok_or_else(|| {
            LmError::format(format!("reserved token {token:?} missing from \\1-grams:"))
        })
    };
    let meta = ModelMeta {
        is_trigram,
        start_id: reserved(config.start_token.as_str())?,
        end_id: reserved(config.end_token.as_str())?,
        unk_id: reserved(config.unk_token.as_str())?,
        scale,
        missing_entry: config.missing_entry,
        score_sentence_end: config.score_sentence_end,
    };

    let model = LanguageModel::from_parts(meta, vocab, unigrams, bigrams, trigrams);
    let stats = model.stats();
    info!(
        order = stats.order,
        vocab = stats.vocab_size,
        bigrams = stats.bigrams,
        trigrams = stats.trigrams,
        "parsed ARPA model"
    );
    Ok(model)
}
