//! Global notes summary: every annotation, grouped by work then chapter

use super::record::{Annotation, ChapterInfo, WorkInfo};
use std::fmt;

/// Notes of one chapter, oldest first
#[derive(Debug, Clone)]
pub struct ChapterSummary {
    pub chapter: ChapterInfo,
    pub notes: Vec<Annotation>,
}

/// Notes of one work
#[derive(Debug, Clone)]
pub struct WorkSummary {
    pub work: WorkInfo,
    pub chapters: Vec<ChapterSummary>,
}

impl WorkSummary {
    pub fn note_count(&self) -> usize {
        self.chapters.iter().map(|c| c.notes.len()).sum()
    }
}

/// All annotations across all works
#[derive(Debug, Clone, Default)]
pub struct NotesSummary {
    pub works: Vec<WorkSummary>,
}

impl NotesSummary {
    /// Group records by work and chapter.
    ///
    /// Works and chapters appear in order of their oldest note. Work
    /// metadata is taken from the newest note, since it is denormalized.
    pub fn build(mut records: Vec<Annotation>) -> Self {
        records.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.note_id.cmp(&b.note_id)));

        let mut works: Vec<WorkSummary> = Vec::new();
        for record in records {
            let pos = match works.iter().position(|w| w.work.work_id == record.work_id) {
                Some(pos) => pos,
                None => {
                    works.push(WorkSummary {
                        work: record.work(),
                        chapters: Vec::new(),
                    });
                    works.len() - 1
                }
            };
            let work = &mut works[pos];
            work.work = record.work();

            match work
                .chapters
                .iter_mut()
                .find(|c| c.chapter.chapter_id == record.chapter_id)
            {
                Some(chapter) => chapter.notes.push(record),
                None => work.chapters.push(ChapterSummary {
                    chapter: record.chapter(),
                    notes: vec![record],
                }),
            }
        }
        Self { works }
    }

    pub fn total(&self) -> usize {
        self.works.iter().map(WorkSummary::note_count).sum()
    }

    pub fn for_work(&self, work_id: &str) -> Option<&WorkSummary> {
        self.works.iter().find(|w| w.work.work_id == work_id)
    }
}

impl fmt::Display for NotesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.works.is_empty() {
            return writeln!(f, "No notes yet.");
        }
        for work in &self.works {
            writeln!(
                f,
                "{} by {} [{}] ({})",
                work.work.title, work.work.author, work.work.fandom, work.work.work_id
            )?;
            for chapter in &work.chapters {
                writeln!(f, "  {}", chapter.chapter.chapter_name)?;
                for note in &chapter.notes {
                    writeln!(f, "    {} \"{}\"", note.marker, note.text)?;
                    if !note.note.is_empty() {
                        writeln!(f, "       {}", note.note)?;
                    }
                }
            }
        }
        Ok(())
    }
}
