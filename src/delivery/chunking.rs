//! Split a report into message-sized chunks.
//!
//! Lengths are counted in characters and no chunk exceeds the limit. The
//! report is Telegram HTML, so a cut never falls inside a tag or an entity,
//! and a cut inside an element closes the open tags at the end of the chunk
//! and reopens them at the start of the next one.
//!
//! Each cut is placed at the best boundary available, in this order:
//!
//! 1. Section break (blank line)
//! 2. Line break
//! 3. Sentence end (`.` `!` `?` `。` `！` `？`)
//! 4. Whitespace
//! 5. Anywhere outside an element
//! 6. Inside an element
//!
//! Cuts that keep the chunk count within `ceil(L / M)` are preferred over
//! better boundaries that would exceed it. Markup can make that bound
//! unreachable; balanced tags win over the bound.
//!
//! Whitespace at a cut is dropped, so joining the chunks reproduces the
//! report modulo whitespace at chunk boundaries and the repaired tags.

use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    InsideElement,
    Anywhere,
    Whitespace,
    Sentence,
    Line,
    Section,
}

fn boundary_before(chars: &[char], p: usize) -> Boundary {
    let prev = chars[p - 1];
    let prev2 = if p >= 2 { Some(chars[p - 2]) } else { None };
    match prev {
        '\n' if prev2 == Some('\n') => Boundary::Section,
        '\n' => Boundary::Line,
        '.' | '!' | '?' | '。' | '！' | '？' => Boundary::Sentence,
        c if c.is_whitespace() => Boundary::Whitespace,
        _ => Boundary::Anywhere,
    }
}

#[derive(Debug, Clone)]
struct OpenTag {
    name: String,
    /// The opening tag as written, attributes included.
    open: String,
}

/// Tag and entity layout of the report.
struct Markup {
    /// `atomic[p]`: a cut before char `p` would split a tag or an entity.
    atomic: Vec<bool>,
    /// `in_tag[i]`: char `i` is part of a tag.
    in_tag: Vec<bool>,
    /// Elements open before char `p`, as an index into `stacks`.
    open_at: Vec<usize>,
    stacks: Vec<Vec<OpenTag>>,
}

impl Markup {
    fn scan(chars: &[char]) -> Self {
        let n = chars.len();
        let mut atomic = vec![false; n + 1];
        let mut in_tag = vec![false; n];
        let mut open_at = vec![0; n + 1];
        let mut stacks: Vec<Vec<OpenTag>> = vec![Vec::new()];

        let mut i = 0;
        while i < n {
            let current = stacks.len() - 1;
            open_at[i] = current;
            let span = match chars[i] {
                '<' => chars[i..].iter().position(|&c| c == '>').map(|len| (len + 1, true)),
                '&' => entity_len(&chars[i..]).map(|len| (len, false)),
                _ => None,
            };
            let Some((len, is_tag)) = span else {
                i += 1;
                continue;
            };

            for p in i + 1..i + len {
                atomic[p] = true;
                open_at[p] = current;
            }
            if is_tag {
                in_tag[i..i + len].iter_mut().for_each(|t| *t = true);
                let tag: String = chars[i..i + len].iter().collect();
                let mut stack = stacks[current].clone();
                if apply_tag(&mut stack, &tag) {
                    stacks.push(stack);
                }
            }
            i += len;
        }
        open_at[n] = stacks.len() - 1;

        Self {
            atomic,
            in_tag,
            open_at,
            stacks,
        }
    }

    fn open(&self, p: usize) -> &[OpenTag] {
        &self.stacks[self.open_at[p]]
    }
}

/// Length of the entity starting at `chars[0] == '&'`, if it is one.
fn entity_len(chars: &[char]) -> Option<usize> {
    let end = chars.iter().take(12).position(|&c| c == ';')?;
    let body = &chars[1..end];
    let valid = !body.is_empty() && body.iter().all(|c| c.is_ascii_alphanumeric() || *c == '#');
    valid.then_some(end + 1)
}

/// Update `stack` for one tag. Returns whether the stack changed.
fn apply_tag(stack: &mut Vec<OpenTag>, tag: &str) -> bool {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    let (closing, rest) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() || rest.ends_with('/') {
        return false;
    }

    if closing {
        match stack.iter().rposition(|t| t.name == name) {
            Some(pos) => {
                stack.truncate(pos);
                true
            }
            None => false,
        }
    } else {
        stack.push(OpenTag {
            name,
            open: tag.to_string(),
        });
        true
    }
}

fn closers(open: &[OpenTag]) -> String {
    open.iter().rev().map(|t| format!("</{}>", t.name)).collect()
}

fn reopeners(open: &[OpenTag]) -> String {
    open.iter().map(|t| t.open.as_str()).collect()
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Returns no chunks for blank text.
pub fn split_chunks(text: &str, max_chars: NonZeroUsize) -> Vec<String> {
    let max = max_chars.get();
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }
    if total <= max {
        return vec![text.to_string()];
    }

    let markup = Markup::scan(&chars);
    let budget = total.div_ceil(max);
    let mut chunks = Vec::with_capacity(budget);
    let mut start = 0usize;
    let mut prefix = String::new();

    while start < total {
        // Limits too small to hold the reopened tags fall back to plain cuts.
        let mut repair = true;
        if prefix.chars().count() >= max {
            prefix.clear();
            repair = false;
        }
        let prefix_len = prefix.chars().count();
        let room = max - prefix_len;
        let close_len = |p: usize| {
            if repair {
                closers(markup.open(p)).chars().count()
            } else {
                0
            }
        };
        let fits = |p: usize| prefix_len + (p - start) + close_len(p) <= max;

        let (cut, closed) = if fits(total) {
            (total, repair)
        } else {
            // Everything after the cut should still fit in the chunks left.
            let remaining = budget.saturating_sub(chunks.len()).max(1);
            let lo = total.saturating_sub((remaining - 1) * max);
            let hi = (start + room).min(total);

            let mut best: Option<(bool, Boundary, usize)> = None;
            let mut has_text = false;
            for p in start + 1..=hi {
                let c = p - 1;
                if !markup.in_tag[c] && !chars[c].is_whitespace() {
                    has_text = true;
                }
                if !has_text || markup.atomic[p] || !fits(p) {
                    continue;
                }
                let class = if markup.open(p).is_empty() {
                    boundary_before(&chars, p)
                } else {
                    Boundary::InsideElement
                };
                let key = (p >= lo, class, p);
                if best.is_none_or(|b| key > b) {
                    best = Some(key);
                }
            }
            match best {
                Some((_, _, p)) => (p, repair),
                None => (hi, false),
            }
        };

        let body: String = chars[start..cut].iter().collect();
        let body = body.trim_end();
        if !body.is_empty() {
            let mut chunk = prefix.clone();
            chunk.push_str(body);
            if closed {
                chunk.push_str(&closers(markup.open(cut)));
            }
            chunks.push(chunk);
        }

        prefix = if closed && cut < total {
            reopeners(markup.open(cut))
        } else {
            String::new()
        };
        start = cut;
        while start < total && chars[start].is_whitespace() {
            start += 1;
        }
    }
    chunks
}
