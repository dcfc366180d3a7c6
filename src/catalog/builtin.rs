use super::{Extent, FormatSpec, StyleSpec};

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn formats() -> Vec<FormatSpec> {
    vec![
        FormatSpec {
            id: "five-character quatrain".to_string(),
            title: "五言绝句".to_string(),
            instruction: concat!(
                "创作1首五言绝句：共4句，每句5字；押平声韵（平水韵/新韵二选一，不混押）；",
                "平仄符合基本格律（忌孤平、三平尾）；用词通俗无生僻字；",
                "必须紧扣图片核心元素，不脱离画面主题。"
            )
            .to_string(),
            description: "短篇幅（4×5字），节奏紧凑，适合突显单一意象。".to_string(),
            total_chars: "20".to_string(),
            line_count: Extent::Fixed(4),
            chars_per_line: Extent::Fixed(5),
        },
        FormatSpec {
            id: "seven-character quatrain".to_string(),
            title: "七言绝句".to_string(),
            instruction: concat!(
                "创作1首七言绝句：共4句，每句7字；押平声韵（平水韵/新韵统一，不换韵）；",
                "平仄符合常见格律（如平起平收、仄起平收）；用词易懂无生僻字；",
                "需围绕图片画面创作，诗词与场景匹配。"
            )
            .to_string(),
            description: "短篇幅（4×7字），信息更饱满，适合情绪冲击型画面。".to_string(),
            total_chars: "28".to_string(),
            line_count: Extent::Fixed(4),
            chars_per_line: Extent::Fixed(7),
        },
        FormatSpec {
            id: "five-character regulated verse".to_string(),
            title: "五言律诗".to_string(),
            instruction: concat!(
                "创作1首五言律诗：共8句，每句5字；押平声韵（全程同一韵部，平水韵/新韵）；",
                "中间两联（3-4句、5-6句）需对仗（词性相对，可宽对）；",
                "平仄合规（句内交替、联间相粘）；用词通俗无生僻字；",
                "需完整呈现图片关键元素，逻辑连贯。"
            )
            .to_string(),
            description: "中篇幅（8×5字），层次分明，适合元素较多的画面。".to_string(),
            total_chars: "40".to_string(),
            line_count: Extent::Fixed(8),
            chars_per_line: Extent::Fixed(5),
        },
        FormatSpec {
            id: "seven-character regulated verse".to_string(),
            title: "七言律诗".to_string(),
            instruction: concat!(
                "创作1首七言律诗：共8句，每句7字；押平声韵（平水韵/新韵统一，不换韵）；",
                "中间两联（3-4句、5-6句）需工整对仗；",
                "平仄合规（忌孤平、三平尾，联间相粘）；用词浅显无生僻字；",
                "需结合图片画面展开，意境与场景一致。"
            )
            .to_string(),
            description: "中长篇幅（8×7字），叙事充足，适合大场景或旅记。".to_string(),
            total_chars: "56".to_string(),
            line_count: Extent::Fixed(8),
            chars_per_line: Extent::Fixed(7),
        },
        FormatSpec {
            id: "ci (matched tune pattern)".to_string(),
            title: "词（自动匹配词牌）".to_string(),
            instruction: concat!(
                "创作 1 首词：按所选风格匹配以下词牌（3 选 1，优先适配画面氛围），",
                "严格遵循所选词牌的字数、句数、韵脚（平 / 仄韵）和基本格律；",
                "用词通俗无生僻字；必须紧扣图片核心元素，不脱离画面主题。",
                "1. 婉约抒情风：《雨霖铃》《点绛唇》《一剪梅》；",
                "2. 豪放壮阔风：《满江红》《破阵子》《贺新郎》；",
                "3. 田园归隐风：《浣溪沙》《采桑子》《行香子》；",
                "4. 禅意空灵风：《捣练子》《相见欢》《阮郎归》；",
                "5. 边塞苍茫风：《渔家傲》《凉州词》《诉衷情令》。"
            )
            .to_string(),
            description: "词体（44-100+字），韵律丰富，适合情绪层次复杂的作品。".to_string(),
            total_chars: "44-100+".to_string(),
            line_count: Extent::Variable,
            chars_per_line: Extent::Variable,
        },
    ]
}

pub fn styles() -> Vec<StyleSpec> {
    vec![
        StyleSpec {
            id: "gentle-lyrical".to_string(),
            title: "婉约抒情风".to_string(),
            instruction: concat!(
                "风格为婉约抒情：语言细腻、情感含蓄，忌直白豪放；",
                "气质柔美雅致，传递温和/内敛情绪；",
                "贴合图片画面氛围，与柔美类场景自然融合；",
                "避免雄浑、苍凉表述。"
            )
            .to_string(),
            description: "柔美细腻，适合江南、花海、月夜等浪漫画面。".to_string(),
            keywords: words(&["细腻", "含蓄", "柔美", "温和"]),
            suitable_scenes: words(&["江南水乡", "花海", "月夜", "春景"]),
        },
        StyleSpec {
            id: "bold-grandeur".to_string(),
            title: "豪放壮阔风".to_string(),
            instruction: concat!(
                "风格为豪放壮阔：语言雄浑有力、气势大气，忌柔媚细腻；",
                "气质开阔震撼，传递对自然伟力的赞叹；",
                "贴合图片画面氛围，与宏大类场景匹配；",
                "避免含蓄、柔弱表述。"
            )
            .to_string(),
            description: "气势宏伟，适合山河、海天、星空等震撼景象。".to_string(),
            keywords: words(&["雄浑", "大气", "震撼", "伟岸"]),
            suitable_scenes: words(&["高山", "大海", "星空", "瀑布"]),
        },
        StyleSpec {
            id: "pastoral-seclusion".to_string(),
            title: "田园归隐风".to_string(),
            instruction: concat!(
                "风格为田园归隐：语言质朴自然、通俗平实，忌华丽辞藻；",
                "气质宁静闲适，传递淡泊/平和态度；",
                "贴合图片画面氛围，与生活化场景一致；",
                "避免宏大、激昂表述。"
            )
            .to_string(),
            description: "恬淡闲适，适合乡村、农舍、竹林等生活场景。".to_string(),
            keywords: words(&["质朴", "宁静", "闲适", "淡泊"]),
            suitable_scenes: words(&["乡村", "农舍", "竹林", "田园"]),
        },
        StyleSpec {
            id: "zen-ethereal".to_string(),
            title: "禅意空灵风".to_string(),
            instruction: concat!(
                "风格为禅意空灵：语言简练清淡、留白感强，忌复杂修辞；",
                "气质清幽静谧，传递平和/淡然哲思；",
                "贴合图片画面氛围，与清幽类场景契合；",
                "避免密集意象、浓烈情绪。"
            )
            .to_string(),
            description: "清幽淡然，适合古寺、薄雾、孤松等静谧氛围。".to_string(),
            keywords: words(&["简练", "清淡", "静谧", "淡然"]),
            suitable_scenes: words(&["古寺", "薄雾", "孤松", "山泉"]),
        },
        StyleSpec {
            id: "frontier-desolation".to_string(),
            title: "边塞苍茫风".to_string(),
            instruction: concat!(
                "风格为边塞苍茫：语言苍凉雄浑、刚劲有力，忌细腻柔美；",
                "气质辽阔悲壮，传递对旷野的感慨；",
                "贴合图片画面氛围，与苍茫类场景匹配；",
                "避免温婉、闲适表述。"
            )
            .to_string(),
            description: "苍凉壮烈，适合沙漠、雪山、戈壁等边塞画面。".to_string(),
            keywords: words(&["苍凉", "雄浑", "辽阔", "悲壮"]),
            suitable_scenes: words(&["沙漠", "雪山", "戈壁", "荒原"]),
        },
    ]
}
