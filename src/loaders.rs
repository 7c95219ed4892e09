use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokenizers::models::bpe::{Merges, Vocab, BPE};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::processors::roberta::RobertaProcessing;
use tokenizers::{AddedToken, Tokenizer};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let hf_api = hf_hub::api::sync::ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| {
                PipelineError::Download(format!("Failed to initialize HuggingFace API: {e}"))
            })?;
        let hf_api = hf_api.model(self.repo.clone());

        let max_retries = 3;
        let mut attempts = 0u32;

        for attempt in 0..max_retries {
            match hf_api.get(self.filename.as_str()) {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    attempts = attempt + 1;
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        let wait_time = Duration::from_millis(100 * (1 << attempt));
                        std::thread::sleep(wait_time);
                        continue;
                    }
                    return Err(PipelineError::Download(format!(
                        "Failed to download '{}' from '{}': {}",
                        self.filename, self.repo, error_msg
                    )));
                }
            }
        }

        Err(PipelineError::Download(format!(
            "Download timed out for '{}' from '{}' after {} attempt(s)",
            self.filename, self.repo, attempts
        )))
    }
}

pub fn tokenizer_from_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| {
        PipelineError::Tokenization(format!(
            "Failed to load tokenizer from '{}': {}",
            path.display(),
            e
        ))
    })
}

/// The subset of a checkpoint's `config.json` needed to pick an architecture.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfigJson {
    #[serde(default)]
    pub model_type: String,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub label2id: HashMap<String, u32>,
    #[serde(default)]
    pub hidden_size: Option<usize>,
    #[serde(default)]
    pub dim: Option<usize>,
}

impl ClassifierConfigJson {
    pub fn num_labels(&self) -> usize {
        self.id2label.len().max(self.label2id.len())
    }

    /// Label names in output-index order.
    ///
    /// Prefers `id2label`; falls back to inverting `label2id`, then to `LABEL_{i}`.
    pub fn labels(&self) -> Vec<String> {
        let n = self.num_labels();
        let inverted: HashMap<u32, &String> =
            self.label2id.iter().map(|(name, id)| (*id, name)).collect();

        (0..n)
            .map(|i| {
                self.id2label
                    .get(&i.to_string())
                    .cloned()
                    .or_else(|| inverted.get(&(i as u32)).map(|s| (*s).clone()))
                    .unwrap_or_else(|| format!("LABEL_{i}"))
            })
            .collect()
    }
}

/// A special token as `special_tokens_map.json` spells it: a bare string or an
/// added-token object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SpecialToken {
    Plain(String),
    Added { content: String },
}

/// `special_tokens_map.json`. Missing entries fall back to the format's usual tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialTokensMap {
    #[serde(default)]
    cls_token: Option<SpecialToken>,
    #[serde(default)]
    sep_token: Option<SpecialToken>,
    #[serde(default)]
    unk_token: Option<SpecialToken>,
    #[serde(default)]
    pad_token: Option<SpecialToken>,
    #[serde(default)]
    mask_token: Option<SpecialToken>,
}

fn content(token: &Option<SpecialToken>, fallback: &str) -> String {
    match token {
        Some(SpecialToken::Plain(s)) | Some(SpecialToken::Added { content: s }) => s.clone(),
        None => fallback.to_string(),
    }
}

/// Special tokens resolved for one tokenizer format.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Specials {
    cls: String,
    sep: String,
    unk: String,
    pad: String,
    mask: String,
}

impl SpecialTokensMap {
    fn bert(&self) -> Specials {
        Specials {
            cls: content(&self.cls_token, "[CLS]"),
            sep: content(&self.sep_token, "[SEP]"),
            unk: content(&self.unk_token, "[UNK]"),
            pad: content(&self.pad_token, "[PAD]"),
            mask: content(&self.mask_token, "[MASK]"),
        }
    }

    fn roberta(&self) -> Specials {
        Specials {
            cls: content(&self.cls_token, "<s>"),
            sep: content(&self.sep_token, "</s>"),
            unk: content(&self.unk_token, "<unk>"),
            pad: content(&self.pad_token, "<pad>"),
            mask: content(&self.mask_token, "<mask>"),
        }
    }
}

/// The part of `tokenizer_config.json` the slow-tokenizer fallbacks need.
#[derive(Debug, Clone, Deserialize)]
struct TokenizerConfigJson {
    #[serde(default = "lowercase_by_default")]
    do_lower_case: bool,
}

fn lowercase_by_default() -> bool {
    true
}

/// How a checkpoint ships its tokenizer, most complete format first.
#[derive(Debug, Clone)]
pub enum TokenizerFormat {
    /// Serialized fast tokenizer (`tokenizer.json`).
    Json(PathBuf),
    /// Byte-level BPE as RoBERTa ships it (`vocab.json` + `merges.txt`).
    ByteLevelBpe { vocab: PathBuf, merges: PathBuf },
    /// fastBPE as BERTweet ships it (`vocab.txt` + `bpe.codes`).
    FastBpe { vocab: PathBuf, codes: PathBuf },
    /// WordPiece as BERT ships it (`vocab.txt`).
    WordPiece { vocab: PathBuf, lowercase: bool },
}

/// Tokenizer files of one checkpoint plus its special-token names.
#[derive(Debug, Clone)]
pub struct TokenizerFiles {
    pub format: TokenizerFormat,
    pub special_tokens: SpecialTokensMap,
}

impl TokenizerFiles {
    /// Find the tokenizer of `repo_id`: `tokenizer.json`, then `vocab.json` +
    /// `merges.txt`, then `vocab.txt` + `bpe.codes`, then `vocab.txt` alone.
    pub fn fetch(repo_id: &str) -> Result<Self> {
        let get = |name: &str| HfLoader::new(repo_id, name).load();

        let special_tokens = match get("special_tokens_map.json") {
            Ok(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            Err(_) => SpecialTokensMap::default(),
        };

        let json_error = match get("tokenizer.json") {
            Ok(path) => {
                return Ok(Self {
                    format: TokenizerFormat::Json(path),
                    special_tokens,
                })
            }
            Err(e) => e,
        };
        tracing::debug!(repo = repo_id, error = %json_error, "no tokenizer.json, trying slow tokenizer files");

        let format = if let (Ok(vocab), Ok(merges)) = (get("vocab.json"), get("merges.txt")) {
            TokenizerFormat::ByteLevelBpe { vocab, merges }
        } else if let Ok(vocab) = get("vocab.txt") {
            match get("bpe.codes") {
                Ok(codes) => TokenizerFormat::FastBpe { vocab, codes },
                Err(_) => {
                    let lowercase = match get("tokenizer_config.json") {
                        Ok(path) => {
                            let config: TokenizerConfigJson =
                                serde_json::from_str(&std::fs::read_to_string(path)?)?;
                            config.do_lower_case
                        }
                        Err(_) => lowercase_by_default(),
                    };
                    TokenizerFormat::WordPiece { vocab, lowercase }
                }
            }
        } else {
            return Err(PipelineError::Download(format!(
                "No tokenizer found in '{repo_id}' (tried tokenizer.json, vocab.json + merges.txt, vocab.txt): {json_error}"
            )));
        };

        Ok(Self {
            format,
            special_tokens,
        })
    }

    /// Build the tokenizer, without any truncation or padding policy.
    pub fn load(&self) -> Result<Tokenizer> {
        match &self.format {
            TokenizerFormat::Json(path) => tokenizer_from_file(path),
            TokenizerFormat::ByteLevelBpe { vocab, merges } => {
                byte_level_bpe(vocab, merges, &self.special_tokens)
            }
            TokenizerFormat::FastBpe { vocab, codes } => {
                fast_bpe(vocab, codes, &self.special_tokens)
            }
            TokenizerFormat::WordPiece { vocab, lowercase } => {
                wordpiece(vocab, *lowercase, &self.special_tokens)
            }
        }
    }
}

fn build_error(files: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Tokenization(format!("Failed to build tokenizer from {files}: {e}"))
}

fn special_id(tokenizer: &Tokenizer, token: &str) -> Result<(String, u32)> {
    tokenizer
        .token_to_id(token)
        .map(|id| (token.to_string(), id))
        .ok_or_else(|| {
            PipelineError::Tokenization(format!("Special token '{token}' is not in the vocabulary"))
        })
}

fn add_specials(tokenizer: &mut Tokenizer, specials: &Specials) {
    let tokens: Vec<AddedToken> = [
        &specials.cls,
        &specials.sep,
        &specials.unk,
        &specials.pad,
        &specials.mask,
    ]
    .into_iter()
    .filter(|t| tokenizer.token_to_id(t).is_some())
    .map(|t| AddedToken::from(t.as_str(), true))
    .collect();
    tokenizer.add_special_tokens(&tokens);
}

/// RoBERTa-style byte-level BPE: `<s> $A </s>`, no prefix space.
pub(crate) fn byte_level_bpe(
    vocab: &Path,
    merges: &Path,
    special_tokens: &SpecialTokensMap,
) -> Result<Tokenizer> {
    let specials = special_tokens.roberta();
    let bpe = BPE::from_file(&vocab.to_string_lossy(), &merges.to_string_lossy())
        .build()
        .map_err(|e| build_error("vocab.json + merges.txt", e))?;

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)));
    tokenizer.with_decoder(Some(ByteLevel::default()));
    let sep = special_id(&tokenizer, &specials.sep)?;
    let cls = special_id(&tokenizer, &specials.cls)?;
    tokenizer.with_post_processor(Some(RobertaProcessing::new(sep, cls).add_prefix_space(false)));
    add_specials(&mut tokenizer, &specials);
    Ok(tokenizer)
}

/// BERTweet's fastBPE. `vocab.txt` lines are `piece count`, with `@@` marking pieces
/// that continue into the next one; ids start after `<s> <pad> </s> <unk>` and the
/// mask token comes last.
pub(crate) fn fast_bpe(
    vocab: &Path,
    codes: &Path,
    special_tokens: &SpecialTokensMap,
) -> Result<Tokenizer> {
    let specials = special_tokens.roberta();

    let mut ids = Vocab::new();
    let leading = [&specials.cls, &specials.pad, &specials.sep, &specials.unk];
    for (id, token) in leading.into_iter().enumerate() {
        ids.entry(token.clone()).or_insert(id as u32);
    }
    let mut next = leading.len() as u32;
    for line in std::fs::read_to_string(vocab)?.lines() {
        let piece = line.rsplit_once(' ').map_or(line, |(piece, _)| piece).trim();
        if piece.is_empty() {
            continue;
        }
        // fastBPE marks continuation with `@@`; the BPE model marks word ends instead.
        let key = match piece.strip_suffix("@@") {
            Some(stem) => stem.to_string(),
            None => format!("{piece}</w>"),
        };
        ids.entry(key).or_insert(next);
        next += 1;
    }
    ids.entry(specials.mask.clone()).or_insert(next);

    // Codes may outnumber the vocabulary; merges producing unknown pieces are dropped.
    let merges: Merges = std::fs::read_to_string(codes)?
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let (a, b) = (parts.next()?, parts.next()?);
            let known = ids.contains_key(a)
                && ids.contains_key(b)
                && ids.contains_key(&format!("{a}{b}"));
            known.then(|| (a.to_string(), b.to_string()))
        })
        .collect();

    let bpe = BPE::builder()
        .vocab_and_merges(ids, merges)
        .unk_token(specials.unk.clone())
        .end_of_word_suffix("</w>".to_string())
        .build()
        .map_err(|e| build_error("vocab.txt + bpe.codes", e))?;

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(Whitespace));
    let sep = special_id(&tokenizer, &specials.sep)?;
    let cls = special_id(&tokenizer, &specials.cls)?;
    tokenizer.with_post_processor(Some(RobertaProcessing::new(sep, cls).trim_offsets(false)));
    add_specials(&mut tokenizer, &specials);
    Ok(tokenizer)
}

/// BERT WordPiece: `[CLS] $A [SEP]`.
pub(crate) fn wordpiece(
    vocab: &Path,
    lowercase: bool,
    special_tokens: &SpecialTokensMap,
) -> Result<Tokenizer> {
    let specials = special_tokens.bert();
    let model = WordPiece::from_file(&vocab.to_string_lossy())
        .unk_token(specials.unk.clone())
        .build()
        .map_err(|e| build_error("vocab.txt", e))?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    let sep = special_id(&tokenizer, &specials.sep)?;
    let cls = special_id(&tokenizer, &specials.cls)?;
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));
    add_specials(&mut tokenizer, &specials);
    Ok(tokenizer)
}

/// Local paths of everything a sequence classifier needs.
#[derive(Debug, Clone)]
pub struct ClassifierFiles {
    pub config_json: String,
    pub probe: ClassifierConfigJson,
    pub tokenizer: TokenizerFiles,
    repo: String,
}

impl ClassifierFiles {
    /// Fetch `config.json` and the tokenizer files. Weights are fetched separately with
    /// [`Self::weights`] so label-count checks can fail before a large download.
    pub fn fetch(repo_id: &str) -> Result<Self> {
        let config = HfLoader::new(repo_id, "config.json").load()?;
        let config_json = std::fs::read_to_string(&config)?;
        let probe: ClassifierConfigJson = serde_json::from_str(&config_json)?;
        let tokenizer = TokenizerFiles::fetch(repo_id)?;

        Ok(Self {
            config_json,
            probe,
            tokenizer,
            repo: repo_id.to_string(),
        })
    }

    pub fn weights(&self) -> Result<PathBuf> {
        HfLoader::new(&self.repo, "model.safetensors")
            .load()
            .or_else(|_| HfLoader::new(&self.repo, "pytorch_model.bin").load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_id2label_order() {
        let probe: ClassifierConfigJson = serde_json::from_str(
            r#"{"model_type":"roberta","id2label":{"2":"Bullish","0":"Bearish","1":"Neutral"}}"#,
        )
        .unwrap();
        assert_eq!(probe.num_labels(), 3);
        assert_eq!(probe.labels(), vec!["Bearish", "Neutral", "Bullish"]);
    }

    #[test]
    fn labels_fall_back_to_label2id() {
        let probe: ClassifierConfigJson = serde_json::from_str(
            r#"{"model_type":"bert","label2id":{"negative":0,"neutral":1,"positive":2}}"#,
        )
        .unwrap();
        assert_eq!(probe.labels(), vec!["negative", "neutral", "positive"]);
    }

    #[test]
    fn missing_fields_default() {
        let probe: ClassifierConfigJson = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.model_type, "");
        assert_eq!(probe.num_labels(), 0);
        assert!(probe.labels().is_empty());
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn special_tokens_accept_strings_and_objects() {
        let map: SpecialTokensMap = serde_json::from_str(
            r#"{"cls_token": "<s>", "mask_token": {"content": "<mask>", "lstrip": true, "normalized": false}}"#,
        )
        .unwrap();
        let bert = map.bert();
        assert_eq!(bert.cls, "<s>");
        assert_eq!(bert.mask, "<mask>");
        assert_eq!(bert.sep, "[SEP]");
    }

    #[test]
    fn wordpiece_from_vocab_txt() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write(
            dir.path(),
            "vocab.txt",
            "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nthe\nmoon\n##s\n!\n",
        );
        let files = TokenizerFiles {
            format: TokenizerFormat::WordPiece {
                vocab,
                lowercase: true,
            },
            special_tokens: SpecialTokensMap::default(),
        };
        let tokenizer = files.load().unwrap();

        let encoding = tokenizer.encode("The moons!", true).unwrap();
        assert_eq!(encoding.get_ids(), &[2, 5, 6, 7, 8, 3]);
        assert_eq!(encoding.get_special_tokens_mask(), &[1, 0, 0, 0, 0, 1]);
        assert_eq!(tokenizer.token_to_id("[MASK]"), Some(4));
    }

    #[test]
    fn byte_level_bpe_from_vocab_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write(
            dir.path(),
            "vocab.json",
            r#"{"<s>": 0, "<pad>": 1, "</s>": 2, "<unk>": 3, "<mask>": 4, "h": 5, "i": 6, "hi": 7, "Ġ": 8, "Ġhi": 9}"#,
        );
        let merges = write(dir.path(), "merges.txt", "#version: 0.2\nh i\nĠ hi\n");
        let tokenizer = byte_level_bpe(&vocab, &merges, &SpecialTokensMap::default()).unwrap();

        let encoding = tokenizer.encode("hi hi", true).unwrap();
        assert_eq!(encoding.get_ids(), &[0, 7, 9, 2]);
        assert_eq!(encoding.get_special_tokens_mask(), &[1, 0, 0, 1]);
        assert_eq!(tokenizer.token_to_id("<mask>"), Some(4));
    }

    #[test]
    fn fast_bpe_from_vocab_and_codes() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write(
            dir.path(),
            "vocab.txt",
            "the 100\nmo@@ 50\non 40\nm@@ 10\no@@ 10\no 10\nn 10\n! 5\n",
        );
        // `t h` refers to pieces the vocabulary lacks.
        let codes = write(dir.path(), "bpe.codes", "m o 10\no n</w> 10\nt h 5\n");
        let tokenizer = fast_bpe(&vocab, &codes, &SpecialTokensMap::default()).unwrap();

        let encoding = tokenizer.encode("moon!", true).unwrap();
        assert_eq!(encoding.get_ids(), &[0, 5, 6, 11, 2]);
        assert_eq!(&encoding.get_offsets()[1..4], &[(0, 2), (2, 4), (4, 5)]);
        assert_eq!(tokenizer.token_to_id("<pad>"), Some(1));
        assert_eq!(tokenizer.token_to_id("<mask>"), Some(12));
    }

    #[test]
    fn missing_special_tokens_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write(dir.path(), "vocab.txt", "[UNK]\nhello\n");
        let err = wordpiece(&vocab, true, &SpecialTokensMap::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Tokenization(_)));
    }
}
