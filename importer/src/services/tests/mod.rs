//! Service-specific tests
//!
//! Each service has its own test file; shared sample data lives in `common`.

#[cfg(test)]
mod store;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::Utc;
    use shared::{ArticleMetadata, BoardId, Cycle, JournalId, SourceId, TopicId};

    use crate::core::{ArticleChange, ArticleWrite, NewState, TopicChange};

    /// efetch response with one complete record
    pub const EFETCH_ONE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2019//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_190101.dtd">
<PubmedArticleSet>
<PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
        <PMID Version="1">31234567</PMID>
        <Article PubModel="Print-Electronic">
            <Journal>
                <ISSN IssnType="Electronic">1527-7755</ISSN>
                <JournalIssue CitedMedium="Internet">
                    <Volume>37</Volume>
                    <Issue>24</Issue>
                    <PubDate>
                        <Year>2019</Year>
                        <Month>Aug</Month>
                        <Day>20</Day>
                    </PubDate>
                </JournalIssue>
                <Title>Journal of clinical oncology : official journal of the American Society of Clinical Oncology</Title>
            </Journal>
            <ArticleTitle>Outcomes of <i>BRCA1</i> carriers &amp; non-carriers.</ArticleTitle>
            <Pagination>
                <MedlinePgn>2105-2113</MedlinePgn>
            </Pagination>
            <Abstract>
                <AbstractText Label="PURPOSE" NlmCategory="OBJECTIVE">To compare outcomes.</AbstractText>
                <AbstractText Label="RESULTS" NlmCategory="RESULTS">Survival   was similar.</AbstractText>
            </Abstract>
            <AuthorList CompleteYN="Y">
                <Author ValidYN="Y">
                    <LastName>Smith</LastName>
                    <ForeName>Jane Q</ForeName>
                    <Initials>JQ</Initials>
                </Author>
                <Author ValidYN="Y">
                    <CollectiveName>Breast Cancer Study Group</CollectiveName>
                </Author>
            </AuthorList>
            <PublicationTypeList>
                <PublicationType UI="D016428">Journal Article</PublicationType>
                <PublicationType UI="D016449">Randomized Controlled Trial</PublicationType>
            </PublicationTypeList>
        </Article>
        <MedlineJournalInfo>
            <Country>United States</Country>
            <MedlineTA>J Clin Oncol</MedlineTA>
            <NlmUniqueID>8309333</NlmUniqueID>
        </MedlineJournalInfo>
        <CommentsCorrectionsList>
            <CommentsCorrections RefType="ErratumIn">
                <RefSource>J Clin Oncol. 2020 Jan 1;38(1):100</RefSource>
                <PMID Version="1">31800000</PMID>
            </CommentsCorrections>
            <CommentsCorrections RefType="CommentIn">
                <RefSource>J Clin Oncol. 2019 Dec;37(36):3600</RefSource>
                <PMID Version="1">31700000</PMID>
            </CommentsCorrections>
            <CommentsCorrections RefType="Cites">
                <RefSource>Lancet. 2001;358:1</RefSource>
            </CommentsCorrections>
        </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
        <ArticleIdList>
            <ArticleId IdType="pubmed">31234567</ArticleId>
        </ArticleIdList>
    </PubmedData>
</PubmedArticle>
</PubmedArticleSet>"#;

    /// efetch response mixing a good record, a broken one and one without a PMID
    pub const EFETCH_MIXED: &str = r#"<PubmedArticleSet>
<PubmedArticle><MedlineCitation Status="PubMed-not-MEDLINE"><PMID Version="1">100</PMID><Article><Journal><JournalIssue><PubDate><MedlineDate>2019 Jul-Aug</MedlineDate></PubDate></JournalIssue><Title>Some Journal</Title></Journal><ArticleTitle>Good record</ArticleTitle></Article><MedlineJournalInfo><NlmUniqueID>0001</NlmUniqueID></MedlineJournalInfo></MedlineCitation></PubmedArticle>
<PubmedArticle><MedlineCitation><PMID Version="1">200</PMID><Article><ArticleTitle>Broken</ArticleTitl></Article></MedlineCitation></PubmedArticle>
<PubmedArticle><MedlineCitation><Article><ArticleTitle>No identifier</ArticleTitle></Article></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;

    pub const ESEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult><Count>3</Count><RetMax>3</RetMax><RetStart>0</RetStart><IdList>
<Id>38000001</Id>
<Id>38000002</Id>
<Id>38000003</Id>
</IdList><TranslationSet/><QueryTranslation>2024/01/15[MDAT]</QueryTranslation></eSearchResult>"#;

    pub fn id(raw: &str) -> SourceId {
        SourceId::parse(raw).expect("valid test source id")
    }

    pub fn cycle() -> Cycle {
        "2020-06-01".parse().expect("valid test cycle")
    }

    pub fn metadata(title: &str) -> ArticleMetadata {
        ArticleMetadata {
            title: title.to_string(),
            journal_id: Some(JournalId::new("8309333")),
            ..ArticleMetadata::default()
        }
    }

    /// New article entering review for board 1, topic 5
    pub fn new_article_change(raw: &str, states: Vec<NewState>) -> ArticleChange {
        ArticleChange {
            source_id: id(raw),
            article: ArticleWrite::Create(metadata(&format!("Article {raw}"))),
            topic: Some(TopicChange {
                board: BoardId::new(1),
                topic: TopicId::new(5),
                cycle: cycle(),
                states,
                tags: Vec::new(),
                comment: None,
            }),
            full_text: None,
            internal_tags: Vec::new(),
            internal_comment: None,
            user: None,
            at: Utc::now(),
        }
    }
}
