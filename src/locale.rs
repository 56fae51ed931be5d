use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ar,
    En,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Some(Language::Ar),
            "en" | "english" => Some(Language::En),
            _ => None,
        }
    }
}

/// Every user-facing string of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    FirstEpisode,
    LastEpisode,
    MangaNotFound,
    EpisodeNotFound,
    NetworkError,
    NoManga,
    ImageUnavailable,
    Loading,
    Error,
    Chapter,
    Page,
    PreviousChapter,
    NextChapter,
    AddressCopied,
    ClipboardUnavailable,
    BookmarkAdded,
    DirectionRtl,
    DirectionLtr,
    SpreadOn,
    SpreadOff,
    Help,
    Bookmarks,
    Library,
}

impl Message {
    pub fn text(self, language: Language) -> &'static str {
        match language {
            Language::Ar => self.arabic(),
            Language::En => self.english(),
        }
    }

    fn arabic(self) -> &'static str {
        match self {
            Message::FirstEpisode => "هذا هو الفصل الأول",
            Message::LastEpisode => "هذا هو آخر فصل",
            Message::MangaNotFound => "لم يتم العثور على المانجا",
            Message::EpisodeNotFound => "لم يتم العثور على الفصل",
            Message::NetworkError => "تعذر الاتصال بالخادم",
            Message::NoManga => "لم يتم تحديد مانجا",
            Message::ImageUnavailable => "تعذر تحميل الصورة",
            Message::Loading => "جاري التحميل...",
            Message::Error => "خطأ",
            Message::Chapter => "الفصل",
            Message::Page => "صفحة",
            Message::PreviousChapter => "الفصل السابق",
            Message::NextChapter => "الفصل التالي",
            Message::AddressCopied => "تم نسخ الرابط",
            Message::ClipboardUnavailable => "الحافظة غير متاحة",
            Message::BookmarkAdded => "تمت إضافة العلامة",
            Message::DirectionRtl => "من اليمين إلى اليسار",
            Message::DirectionLtr => "من اليسار إلى اليمين",
            Message::SpreadOn => "عرض صفحتين",
            Message::SpreadOff => "عرض صفحة واحدة",
            Message::Help => "مساعدة",
            Message::Bookmarks => "العلامات",
            Message::Library => "المكتبة",
        }
    }

    fn english(self) -> &'static str {
        match self {
            Message::FirstEpisode => "This is the first chapter",
            Message::LastEpisode => "This is the last chapter",
            Message::MangaNotFound => "Manga not found",
            Message::EpisodeNotFound => "Chapter not found",
            Message::NetworkError => "Could not reach the server",
            Message::NoManga => "No manga selected",
            Message::ImageUnavailable => "Could not load the image",
            Message::Loading => "Loading...",
            Message::Error => "Error",
            Message::Chapter => "Chapter",
            Message::Page => "Page",
            Message::PreviousChapter => "Previous chapter",
            Message::NextChapter => "Next chapter",
            Message::AddressCopied => "Address copied",
            Message::ClipboardUnavailable => "Clipboard unavailable",
            Message::BookmarkAdded => "Bookmark added",
            Message::DirectionRtl => "Right to left",
            Message::DirectionLtr => "Left to right",
            Message::SpreadOn => "Two-page spread",
            Message::SpreadOff => "Single page",
            Message::Help => "Help",
            Message::Bookmarks => "Bookmarks",
            Message::Library => "Library",
        }
    }
}
