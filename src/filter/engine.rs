use super::error::{FilterError, ValidationError};
use super::rule::{Exclusion, Inclusion, RuleSpec};
use crate::entry::Entry;
use crate::format::EntryFormatter;
use crate::journal::SourceError;
use std::io::Write;
use tracing::debug;

/// Inclusion and exclusion rules owned by a single formatter.
#[derive(Debug, Default)]
pub struct FilterRules {
    pub inclusions: Vec<Inclusion>,
    pub exclusions: Vec<Exclusion>,
}

/// Which rule set a formatter is filtered with.
#[derive(Debug)]
pub enum ConsumerRules {
    /// The filter's default inclusions and exclusions.
    SharedDefaults,
    /// Rules declared by the formatter itself.
    Own(FilterRules),
}

/// Statistics about a default exclusion rule.
#[derive(Debug, Clone, Copy)]
pub struct ExclusionStatistics<'a> {
    pub hits: u64,
    pub exclusion: &'a Exclusion,
}

struct Consumer {
    formatter: Box<dyn EntryFormatter>,
    rules: ConsumerRules,
}

/// Apply filter rules to journal entries for a list of formatters.
///
/// Each formatter either declares its own rules or uses the defaults.
/// Default exclusions are evaluated at most once per entry, however many
/// formatters share them, so their hit counts reflect entries rather than
/// formatter passes.
pub struct JournalFilter<I> {
    entries: I,
    consumers: Vec<Consumer>,
    default_inclusions: Vec<Inclusion>,
    default_exclusions: Vec<Exclusion>,
}

impl<I> JournalFilter<I>
where
    I: Iterator<Item = Result<Entry, SourceError>>,
{
    pub fn new(
        entries: I,
        formatters: Vec<Box<dyn EntryFormatter>>,
        default_inclusions: &[RuleSpec],
        default_exclusions: &[RuleSpec],
    ) -> Result<Self, ValidationError> {
        let default_inclusions = default_inclusions
            .iter()
            .map(Inclusion::new)
            .collect::<Result<Vec<_>, _>>()?;
        let default_exclusions = default_exclusions
            .iter()
            .map(Exclusion::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut consumers = Vec::with_capacity(formatters.len());
        for formatter in formatters {
            let inclusions = formatter.filter_inclusions().filter(|r| !r.is_empty());
            let exclusions = formatter.filter_exclusions().filter(|r| !r.is_empty());

            let rules = if inclusions.is_some() || exclusions.is_some() {
                debug!(formatter = formatter.name(), "using formatter's own rules");
                ConsumerRules::Own(FilterRules {
                    inclusions: inclusions
                        .unwrap_or_default()
                        .iter()
                        .map(Inclusion::new)
                        .collect::<Result<_, _>>()?,
                    exclusions: exclusions
                        .unwrap_or_default()
                        .iter()
                        .map(Exclusion::new)
                        .collect::<Result<_, _>>()?,
                })
            } else {
                ConsumerRules::SharedDefaults
            };

            consumers.push(Consumer { formatter, rules });
        }

        Ok(JournalFilter {
            entries,
            consumers,
            default_inclusions,
            default_exclusions,
        })
    }

    /// Feed every entry through the filters into `out`, then flush each formatter.
    ///
    /// A failing source still flushes; a failing output does not.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<(), FilterError> {
        let mut source_error = None;
        let mut count = 0usize;

        while let Some(item) = self.entries.next() {
            match item {
                Ok(entry) => {
                    count += 1;
                    self.dispatch(&entry, out).map_err(FilterError::Sink)?;
                }
                Err(e) => {
                    source_error = Some(e);
                    break;
                }
            }
        }
        debug!(entries = count, "journal entries processed");

        for consumer in &mut self.consumers {
            out.write_all(consumer.formatter.flush().as_bytes())
                .map_err(FilterError::Sink)?;
        }
        out.flush().map_err(FilterError::Sink)?;

        match source_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn dispatch<W: Write>(&mut self, entry: &Entry, out: &mut W) -> std::io::Result<()> {
        let mut default_excluded: Option<bool> = None;

        for consumer in &mut self.consumers {
            let (inclusions, own_exclusions) = match &mut consumer.rules {
                ConsumerRules::SharedDefaults => (&self.default_inclusions, None),
                ConsumerRules::Own(rules) => (&rules.inclusions, Some(&mut rules.exclusions)),
            };

            if !inclusions.is_empty() && !inclusions.iter().any(|incl| incl.matches(entry)) {
                continue;
            }

            let excluded_by_default = *default_excluded.get_or_insert_with(|| {
                self.default_exclusions
                    .iter_mut()
                    .any(|excl| excl.matches(entry))
            });

            let excluded = match own_exclusions {
                None => excluded_by_default,
                Some(exclusions) => exclusions.iter_mut().any(|excl| excl.matches(entry)),
            };
            if excluded {
                continue;
            }

            out.write_all(consumer.formatter.format(entry).as_bytes())?;
        }

        Ok(())
    }

    /// Default exclusions with their hit counts, most hits first.
    pub fn statistics(&self) -> Vec<ExclusionStatistics<'_>> {
        let mut stats: Vec<ExclusionStatistics<'_>> = self
            .default_exclusions
            .iter()
            .map(|exclusion| ExclusionStatistics {
                hits: exclusion.hits(),
                exclusion,
            })
            .collect();
        stats.sort_by(|a, b| b.hits.cmp(&a.hits));
        stats
    }

    pub fn consumer_rules(&self) -> impl Iterator<Item = (&'static str, &ConsumerRules)> {
        self.consumers
            .iter()
            .map(|c| (c.formatter.name(), &c.rules))
    }
}
