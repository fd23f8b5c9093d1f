//! PubMed XML parsing
//!
//! Turns efetch (`rettype=medline&retmode=xml`) and esearch responses into
//! normalized records and identifier lists. Each `<PubmedArticle>` element is
//! parsed on its own, so one malformed record never spoils its neighbours.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use shared::{
    AbstractParagraph, ArticleMetadata, Author, FetchOutcome, JournalId, NormalizedRecord, RelatedReference,
    RelationKind, SourceId,
};

use crate::error::{ImportError, ImportResult};

const ARTICLE_OPEN: &str = "<PubmedArticle";
const ARTICLE_CLOSE: &str = "</PubmedArticle>";

fn parse_error(context: &str, err: impl std::fmt::Display) -> ImportError {
    ImportError::ParseError { message: format!("{context}: {err}") }
}

/// Text of a top-level `<ERROR>` element, if the service reported one
pub fn find_error(xml: &str) -> Option<String> {
    let start = xml.find("<ERROR>")? + "<ERROR>".len();
    let end = xml[start..].find("</ERROR>")? + start;
    Some(xml[start..end].trim().to_string())
}

/// Slice an efetch response into one document per `<PubmedArticle>` element
pub fn split_articles(xml: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut rest = xml;
    while let Some(open) = rest.find(ARTICLE_OPEN) {
        let after_name = &rest[open + ARTICLE_OPEN.len()..];
        // Skip <PubmedArticleSet>
        if !after_name.starts_with('>') && !after_name.starts_with(char::is_whitespace) {
            rest = after_name;
            continue;
        }
        let Some(close) = rest[open..].find(ARTICLE_CLOSE) else {
            break;
        };
        let end = open + close + ARTICLE_CLOSE.len();
        documents.push(&rest[open..end]);
        rest = &rest[end..];
    }
    documents
}

/// First `<PMID>` text in a document, found without a full parse
fn sniff_pmid(document: &str) -> Option<SourceId> {
    let open = document.find("<PMID")?;
    let start = document[open..].find('>')? + open + 1;
    let end = document[start..].find("</PMID>")? + start;
    SourceId::parse(document[start..end].trim()).ok()
}

/// Parse a whole efetch response
///
/// # Returns
/// One outcome per `<PubmedArticle>`. Records that fail to parse become
/// failures when their PMID can still be recovered; otherwise they are dropped
/// and the identifier later shows up as not returned.
pub fn parse_efetch(xml: &str) -> ImportResult<Vec<FetchOutcome>> {
    if let Some(message) = find_error(xml) {
        return Err(ImportError::SourceError { message, transient: false });
    }

    let mut outcomes = Vec::new();
    for document in split_articles(xml) {
        match parse_article(document) {
            Ok(record) => outcomes.push(FetchOutcome::Found(record)),
            Err(err) => match sniff_pmid(document) {
                Some(id) => outcomes.push(FetchOutcome::failed(id, err.to_string())),
                None => tracing::warn!(error = %err, "Dropping unidentifiable PubMed record"),
            },
        }
    }
    Ok(outcomes)
}

/// Parse an esearch response into its identifier list
pub fn parse_esearch(xml: &str) -> ImportResult<Vec<SourceId>> {
    if let Some(message) = find_error(xml) {
        return Err(ImportError::SourceError { message, transient: false });
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    let mut in_id = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => in_id = e.name().as_ref() == b"Id",
            Ok(Event::End(_)) => in_id = false,
            Ok(Event::Text(e)) if in_id => {
                let text = e.unescape().map_err(|err| parse_error("esearch id", err))?;
                match SourceId::parse(text.trim()) {
                    Ok(id) => ids.push(id),
                    Err(err) => tracing::debug!(error = %err, "Skipping malformed esearch id"),
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error("esearch response", err)),
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// Field a text event belongs to
#[derive(Debug, Clone, Copy)]
enum Slot {
    Title,
    Abstract,
    LastName,
    ForeName,
    Initials,
    CollectiveName,
    RelatedPmid,
    RefSource,
    Pmid,
    JournalTitle,
    Volume,
    Issue,
    Pagination,
    Year,
    Month,
    Day,
    Season,
    MedlineDate,
    PublicationType,
    JournalId,
    BriefTitle,
    Ignored,
}

#[derive(Default)]
struct Related {
    ref_type: String,
    pmid: Option<String>,
    citation: String,
}

/// Element-path driven accumulator for one `<PubmedArticle>`
#[derive(Default)]
struct RecordBuilder {
    path: Vec<String>,
    pmid: Option<String>,
    citation_status: Option<String>,
    metadata: ArticleMetadata,
    title: String,
    author: Option<Author>,
    paragraph: Option<(Option<String>, String)>,
    related: Option<Related>,
    references: Vec<RelatedReference>,
}

fn attribute(e: &BytesStart<'_>, name: &str) -> ImportResult<Option<String>> {
    match e.try_get_attribute(name).map_err(|err| parse_error(name, err))? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(|err| parse_error(name, err))?.into_owned())),
        None => Ok(None),
    }
}

fn set(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl RecordBuilder {
    /// Whether the open element path ends with `suffix`
    fn at(&self, suffix: &[&str]) -> bool {
        self.path.len() >= suffix.len()
            && self.path[self.path.len() - suffix.len()..]
                .iter()
                .zip(suffix)
                .all(|(open, want)| open.as_str() == *want)
    }

    fn within(&self, name: &str) -> bool {
        self.path.iter().any(|open| open == name)
    }

    fn start(&mut self, e: &BytesStart<'_>) -> ImportResult<()> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        self.path.push(name);

        if self.at(&["PubmedArticle", "MedlineCitation"]) {
            self.citation_status = attribute(e, "Status")?;
        } else if self.at(&["AuthorList", "Author"]) {
            self.author = Some(Author::default());
        } else if self.at(&["Abstract", "AbstractText"]) {
            self.paragraph = Some((attribute(e, "Label")?, String::new()));
        } else if self.at(&["CommentsCorrectionsList", "CommentsCorrections"]) {
            self.related = Some(Related { ref_type: attribute(e, "RefType")?.unwrap_or_default(), ..Related::default() });
        }
        Ok(())
    }

    fn end(&mut self) {
        if self.at(&["AuthorList", "Author"]) {
            if let Some(author) = self.author.take() {
                if author.last_name.is_some() || author.collective_name.is_some() {
                    self.metadata.authors.push(author);
                }
            }
        } else if self.at(&["Abstract", "AbstractText"]) {
            if let Some((label, text)) = self.paragraph.take() {
                let text = collapse(&text);
                if !text.is_empty() {
                    self.metadata.abstract_paragraphs.push(AbstractParagraph { label, text });
                }
            }
        } else if self.at(&["CommentsCorrectionsList", "CommentsCorrections"]) {
            if let Some(related) = self.related.take() {
                match related.pmid.as_deref().map(|raw| SourceId::parse(raw.trim())) {
                    Some(Ok(source_id)) => self.references.push(RelatedReference {
                        source_id,
                        relation: RelationKind::from_ref_type(&related.ref_type),
                        citation: Some(collapse(&related.citation)).filter(|c| !c.is_empty()),
                    }),
                    Some(Err(err)) => tracing::debug!(error = %err, "Skipping related reference"),
                    None => {}
                }
            }
        }
        self.path.pop();
    }

    fn slot(&self) -> Slot {
        if self.within("ArticleTitle") {
            return Slot::Title;
        }
        if self.within("AbstractText") {
            return Slot::Abstract;
        }
        const SLOTS: &[(&str, &str, Slot)] = &[
            ("Author", "LastName", Slot::LastName),
            ("Author", "ForeName", Slot::ForeName),
            ("Author", "Initials", Slot::Initials),
            ("Author", "CollectiveName", Slot::CollectiveName),
            ("CommentsCorrections", "PMID", Slot::RelatedPmid),
            ("CommentsCorrections", "RefSource", Slot::RefSource),
            ("MedlineCitation", "PMID", Slot::Pmid),
            ("Journal", "Title", Slot::JournalTitle),
            ("JournalIssue", "Volume", Slot::Volume),
            ("JournalIssue", "Issue", Slot::Issue),
            ("Pagination", "MedlinePgn", Slot::Pagination),
            ("PubDate", "Year", Slot::Year),
            ("PubDate", "Month", Slot::Month),
            ("PubDate", "Day", Slot::Day),
            ("PubDate", "Season", Slot::Season),
            ("PubDate", "MedlineDate", Slot::MedlineDate),
            ("PublicationTypeList", "PublicationType", Slot::PublicationType),
            ("MedlineJournalInfo", "NlmUniqueID", Slot::JournalId),
            ("MedlineJournalInfo", "MedlineTA", Slot::BriefTitle),
        ];
        SLOTS
            .iter()
            .find(|(parent, leaf, _)| self.at(&[*parent, *leaf]))
            .map_or(Slot::Ignored, |(_, _, slot)| *slot)
    }

    fn text(&mut self, text: &str) {
        let slot = self.slot();
        let metadata = &mut self.metadata;
        match slot {
            Slot::Title => self.title.push_str(text),
            Slot::Abstract => {
                if let Some((_, paragraph)) = self.paragraph.as_mut() {
                    paragraph.push_str(text);
                }
            }
            Slot::LastName => {
                if let Some(author) = self.author.as_mut() {
                    set(&mut author.last_name, text);
                }
            }
            Slot::ForeName => {
                if let Some(author) = self.author.as_mut() {
                    set(&mut author.forename, text);
                }
            }
            Slot::Initials => {
                if let Some(author) = self.author.as_mut() {
                    set(&mut author.initials, text);
                }
            }
            Slot::CollectiveName => {
                if let Some(author) = self.author.as_mut() {
                    set(&mut author.collective_name, text);
                }
            }
            Slot::RelatedPmid => {
                if let Some(related) = self.related.as_mut() {
                    set(&mut related.pmid, text);
                }
            }
            Slot::RefSource => {
                if let Some(related) = self.related.as_mut() {
                    related.citation.push_str(text);
                }
            }
            Slot::Pmid => set(&mut self.pmid, text),
            Slot::JournalTitle => set(&mut metadata.journal_title, text),
            Slot::Volume => set(&mut metadata.volume, text),
            Slot::Issue => set(&mut metadata.issue, text),
            Slot::Pagination => set(&mut metadata.pagination, text),
            Slot::Year => set(&mut metadata.pub_date.year, text),
            Slot::Month => set(&mut metadata.pub_date.month, text),
            Slot::Day => set(&mut metadata.pub_date.day, text),
            Slot::Season => set(&mut metadata.pub_date.season, text),
            Slot::MedlineDate => set(&mut metadata.pub_date.medline_date, text),
            Slot::PublicationType => metadata.publication_types.push(text.trim().to_string()),
            Slot::JournalId => metadata.journal_id = Some(JournalId::new(text.trim())),
            Slot::BriefTitle => set(&mut metadata.brief_journal_title, text),
            Slot::Ignored => {}
        }
    }

    fn finish(self) -> ImportResult<NormalizedRecord> {
        let raw = self.pmid.ok_or_else(|| parse_error("PubmedArticle", "missing PMID"))?;
        let source_id = SourceId::parse(raw.trim())?;

        let trim = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut metadata = self.metadata;
        metadata.title = collapse(&self.title);
        metadata.journal_title = trim(metadata.journal_title);
        metadata.brief_journal_title = trim(metadata.brief_journal_title);
        metadata.volume = trim(metadata.volume);
        metadata.issue = trim(metadata.issue);
        metadata.pagination = trim(metadata.pagination);
        let date = &mut metadata.pub_date;
        date.year = trim(date.year.take());
        date.month = trim(date.month.take());
        date.day = trim(date.day.take());
        date.season = trim(date.season.take());
        date.medline_date = trim(date.medline_date.take());
        for author in &mut metadata.authors {
            author.last_name = trim(author.last_name.take());
            author.forename = trim(author.forename.take());
            author.initials = trim(author.initials.take());
            author.collective_name = trim(author.collective_name.take());
        }

        Ok(NormalizedRecord { source_id, metadata, related: self.references, citation_status: self.citation_status })
    }
}

/// Parse one `<PubmedArticle>` document into a normalized record
pub fn parse_article(document: &str) -> ImportResult<NormalizedRecord> {
    // Whitespace is kept so inline markup in titles does not glue words together
    let mut reader = Reader::from_str(document);
    let mut buf = Vec::new();
    let mut builder = RecordBuilder::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => builder.start(e)?,
            Ok(Event::Empty(ref e)) => {
                builder.start(e)?;
                builder.end();
            }
            Ok(Event::End(_)) => builder.end(),
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| parse_error("text", err))?;
                builder.text(&text);
            }
            Ok(Event::CData(e)) => builder.text(&String::from_utf8_lossy(&e)),
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(parse_error(&format!("position {}", reader.buffer_position()), err));
            }
            _ => {}
        }
        buf.clear();
    }

    builder.finish()
}
